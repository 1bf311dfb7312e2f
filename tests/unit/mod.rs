//! Unit test modules.

mod nmea_codec_test;
mod route_import_test;
