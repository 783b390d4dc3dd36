pub mod generation_repo;

pub use generation_repo::GenerationRepo;
