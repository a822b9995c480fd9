//! Cross-module tests for the container runtime and the notification
//! pipeline. Feature-specific behavior is tested next to each feature.
