pub mod scanner;
pub mod scorer;
