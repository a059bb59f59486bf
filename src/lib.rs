pub mod flash;
pub mod fs;
pub mod image;
pub mod uf2;
