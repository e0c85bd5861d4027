// Shader module loading
//
// Vulkan consumes SPIR-V bytecode. GLSL sources under `shaders/` are
// compiled by the build script; the recipes here only load the result.

use std::ffi::CStr;
use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use ash::vk;

pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Decode SPIR-V bytes into aligned words, checking size and magic number
pub fn load_spirv_from_bytes(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        anyhow::bail!("SPIR-V code size {} is not a non-zero multiple of 4", bytes.len());
    }

    let words = ash::util::read_spv(&mut Cursor::new(bytes)).context("Could not read SPIR-V code")?;
    if words.first() != Some(&SPIRV_MAGIC) {
        anyhow::bail!("Missing SPIR-V magic number");
    }

    Ok(words)
}

pub fn load_spirv_from_file(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("Could not open shader file {}", path.display()))?;

    load_spirv_from_bytes(&bytes).with_context(|| format!("Invalid shader file {}", path.display()))
}

pub fn create_shader_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

    unsafe { device.create_shader_module(&create_info, None) }.context("Could not create a shader module")
}

/// One pipeline stage: a module, its entry point and optional specialization
#[derive(Clone, Copy)]
pub struct ShaderStageParameters<'a> {
    pub stage: vk::ShaderStageFlags,
    pub module: vk::ShaderModule,
    pub entry_point: &'a CStr,
    pub specialization_info: Option<&'a vk::SpecializationInfo>,
}

impl<'a> ShaderStageParameters<'a> {
    pub fn new(stage: vk::ShaderStageFlags, module: vk::ShaderModule) -> Self {
        Self {
            stage,
            module,
            entry_point: c"main",
            specialization_info: None,
        }
    }
}

/// The returned stages point into `params`' entry points and specialization data.
pub fn specify_pipeline_shader_stages(params: &[ShaderStageParameters<'_>]) -> Vec<vk::PipelineShaderStageCreateInfo> {
    params
        .iter()
        .map(|p| {
            let mut stage = vk::PipelineShaderStageCreateInfo::builder()
                .stage(p.stage)
                .module(p.module)
                .name(p.entry_point);
            if let Some(info) = p.specialization_info {
                stage = stage.specialization_info(info);
            }
            stage.build()
        })
        .collect()
}

pub fn destroy_shader_module(device: &ash::Device, module: &mut vk::ShaderModule) {
    if *module != vk::ShaderModule::null() {
        unsafe { device.destroy_shader_module(*module, None) };
        *module = vk::ShaderModule::null();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spirv_header() -> Vec<u8> {
        [SPIRV_MAGIC, 0x0001_0000, 0, 1, 0]
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect()
    }

    #[test]
    fn loads_valid_words() {
        let words = load_spirv_from_bytes(&spirv_header()).unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(words[0], SPIRV_MAGIC);
    }

    #[test]
    fn rejects_bad_size_and_magic() {
        assert!(load_spirv_from_bytes(&[]).is_err());
        assert!(load_spirv_from_bytes(&[1, 2, 3]).is_err());
        assert!(load_spirv_from_bytes(&[0u8; 8]).is_err());
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join("vulkan_cookbook_shader_test.spv");
        std::fs::write(&path, spirv_header()).unwrap();

        let words = load_spirv_from_file(&path).unwrap();
        assert_eq!(words.len(), 5);

        std::fs::remove_file(&path).unwrap();
        assert!(load_spirv_from_file(&path).is_err());
    }

    #[test]
    fn stages_keep_entry_point_and_specialization() {
        let spec = vk::SpecializationInfo::default();
        let params = [
            ShaderStageParameters::new(vk::ShaderStageFlags::VERTEX, vk::ShaderModule::null()),
            ShaderStageParameters {
                specialization_info: Some(&spec),
                ..ShaderStageParameters::new(vk::ShaderStageFlags::FRAGMENT, vk::ShaderModule::null())
            },
        ];

        let stages = specify_pipeline_shader_stages(&params);
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].stage, vk::ShaderStageFlags::VERTEX);
        assert!(stages[0].p_specialization_info.is_null());
        assert!(!stages[1].p_specialization_info.is_null());
        let name = unsafe { CStr::from_ptr(stages[1].p_name) };
        assert_eq!(name, c"main");
    }
}
