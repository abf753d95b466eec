pub mod error;
pub mod invoice;
pub mod tracker;

pub use error::{InvoiceError, Result};
pub use invoice::{Invoice, InvoiceDetails, InvoiceKind, InvoicePayment, InvoiceStatus};
pub use tracker::InvoiceTracker;
