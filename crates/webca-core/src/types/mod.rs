mod crl;
mod extension;
mod key;
mod record;
mod request;
mod revocation;
mod subject;
mod template;
mod usage;

pub use crl::*;
pub use extension::*;
pub use key::*;
pub use record::*;
pub use request::*;
pub use revocation::*;
pub use subject::*;
pub use template::*;
pub use usage::*;
