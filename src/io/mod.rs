//! File I/O helpers.

pub mod writer;

pub use writer::PdfWriter;
