pub mod geoip;
