pub mod experience_handlers;
pub mod jd2cv_handlers;
pub mod jd_handlers;
pub mod reading_handlers;
pub mod system_handlers;

pub use experience_handlers::*;
pub use jd2cv_handlers::*;
pub use jd_handlers::*;
pub use reading_handlers::*;
pub use system_handlers::*;
