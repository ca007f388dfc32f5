//! End-to-end checks of the scan stream, driven through scripted and live
//! engines.

#[cfg(test)]
mod fixtures;
#[cfg(test)]
mod streaming;
