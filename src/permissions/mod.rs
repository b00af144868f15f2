// Permission resolution: catalog x active grants -> allowed modules

pub mod grant;
pub mod resolver;

pub use grant::*;
pub use resolver::*;
