pub mod decimator;
