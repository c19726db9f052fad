//! Lifecycle domain model and the gateway contracts the core drives.
//!
//! | Trait | Backs | Implementations |
//! |-------|-------|-----------------|
//! | `ApplicationRepository` | application resources, current blob pointer | `InMemoryApplicationRepository`, `PostgresApplicationRepository` |
//! | `BuildPipeline` | build runs | `InMemoryBuildPipeline`, `PostgresBuildPipeline`, wrapped by `QueuedBuildPipeline` when the MQ is on |
//! | `WorkloadRuntime` | materialized workloads | `InMemoryWorkloadRuntime`, `PostgresWorkloadRuntime` |
//! | `DependentRepository` | configurations, services, bindings | `InMemoryDependentRepository`, `PostgresDependentRepository` |
//!
//! Blob storage lives in `common::storage`.

pub mod application;
pub mod build;
pub mod dependent;
pub mod repository;
pub mod workload;

pub use application::{Application, ApplicationPatch};
pub use build::BuildRun;
pub use dependent::{
    BindOutcome, Binding, ContentEdit, DeleteOutcome, Dependent, DependentKey, DependentKind,
};
pub use repository::{
    ApplicationRepository, BuildPipeline, DependentRepository, GatewayError, WorkloadRuntime,
};
pub use workload::{BoundSecret, DeployRecord, TlsCertificate, Workload};
