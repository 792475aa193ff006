//! Uniform random selection.

use rand::seq::SliceRandom;

use crate::load_balancer::{pool::RelayHost, LoadBalancer};

/// Picks every host with equal probability, independently per call.
#[derive(Debug, Default)]
pub struct RandomChoice;

impl RandomChoice {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for RandomChoice {
    fn next_host<'a>(&self, hosts: &'a [RelayHost]) -> Option<&'a RelayHost> {
        hosts.choose(&mut rand::thread_rng())
    }
}
