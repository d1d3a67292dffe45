pub mod invoice_number;
pub mod window;
