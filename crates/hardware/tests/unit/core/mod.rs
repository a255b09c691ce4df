//! Hart array tests.
