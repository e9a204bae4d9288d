// Reconciler state machine
pub mod controller;

// Configuration layer
pub mod config;

// CarbonAwareJob custom resource
pub mod crd;

// Cloud environment detection from node labels
pub mod introspection;

// Kubernetes client initialization
pub mod kube_client;

// Client for the scheduling service
pub mod scheduling_client;
