
pub mod classifier_tests;
pub mod priority_tests;
pub mod tex_produced_tests;
