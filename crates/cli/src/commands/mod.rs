pub mod demultiplex;
pub mod inspect;
pub mod simulate;
