mod controls_test;
mod correlation_test;
mod extended_test;
mod interop_test;
