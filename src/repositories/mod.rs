//! Repositorios
//!
//! Contratos de acceso a los almacenes externos (pedidos, tarifas,
//! clientes, usuarios) y sus implementaciones en memoria.

pub mod client_repository;
pub mod pedido_repository;
pub mod tarifa_repository;
pub mod user_repository;

pub use client_repository::{ClientDirectory, Cliente, MemoryClientDirectory};
pub use pedido_repository::{BundleStore, MemoryBundleStore};
pub use tarifa_repository::{MemoryTariffStore, TariffStore};
pub use user_repository::{MemoryUserDirectory, UserDirectory};
