pub mod bar;
pub mod csv;
pub mod domain;
pub mod indicator;
pub mod series;
pub mod store;
