pub mod pioneer_engine;
pub mod pioneer_service;

pub use pioneer_engine::PioneerEngine;
pub use pioneer_service::PioneerService;
