pub mod forecast;
pub mod incident;
pub mod offender;

pub use forecast::*;
pub use incident::*;
pub use offender::*;
