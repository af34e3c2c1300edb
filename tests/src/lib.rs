//! Loopback end-to-end tests: real execution daemons, real `grep`, one coordinator.

#[cfg(test)]
mod support;

#[cfg(test)]
mod dispatch;
