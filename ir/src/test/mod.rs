//! Test support: unit tests and property-test generators.
