// Helper recipes that never touch the GPU: matrices, textures and meshes.

pub mod matrix;
pub mod mesh;
pub mod texture;
