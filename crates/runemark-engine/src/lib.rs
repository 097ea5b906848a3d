pub mod io;
pub mod marks;


// Re-export key types for easier usage
pub use io::*;
pub use marks::*;
