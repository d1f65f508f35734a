pub mod solis;
