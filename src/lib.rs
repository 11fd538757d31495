//! Four-way intersection traffic simulation
//!
//! A discrete-event simulation of cars queueing on entrance lanes and
//! crossing a signalised intersection, with a fixed-cycle or an adaptive
//! traffic light.

pub mod simulation;
