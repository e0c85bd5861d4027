// Instance recipes - Loader connection, instance extensions, instance creation
//
// Everything here happens before a physical device is chosen:
// - Connect with the Vulkan loader
// - Query instance-level extensions and layers
// - Create (and destroy) the instance
// - Route validation layer output into `log`

use anyhow::{Context, Result};
use ash::{vk, Entry};
use raw_window_handle::RawDisplayHandle;
use std::ffi::{CStr, CString};

use super::surface::required_surface_extensions;

/// Name of the Khronos validation layer
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Connect with the Vulkan loader library.
pub fn load_vulkan_library() -> Result<Entry> {
    let entry = unsafe { Entry::load() }
        .context("Failed to load Vulkan library. Is Vulkan installed?")?;
    log::debug!("Vulkan loader connected");
    Ok(entry)
}

pub fn available_instance_extensions(entry: &Entry) -> Result<Vec<vk::ExtensionProperties>> {
    let extensions = entry
        .enumerate_instance_extension_properties(None)
        .context("Could not get the number of instance extensions")?;

    if extensions.is_empty() {
        anyhow::bail!("Could not enumerate instance extensions");
    }

    Ok(extensions)
}

pub fn available_instance_layers(entry: &Entry) -> Result<Vec<vk::LayerProperties>> {
    entry
        .enumerate_instance_layer_properties()
        .context("Could not enumerate instance layers")
}

/// Extension name stored inside a driver-filled properties struct.
pub fn extension_name(properties: &vk::ExtensionProperties) -> &CStr {
    // Safety: the driver writes a NUL-terminated string into the fixed array
    unsafe { CStr::from_ptr(properties.extension_name.as_ptr()) }
}

pub fn layer_name(properties: &vk::LayerProperties) -> &CStr {
    unsafe { CStr::from_ptr(properties.layer_name.as_ptr()) }
}

/// Check whether `name` appears in a list of available extensions
pub fn is_extension_supported(available: &[vk::ExtensionProperties], name: &CStr) -> bool {
    available.iter().any(|ext| extension_name(ext) == name)
}

/// Desired extensions that are not present in `available`, in request order
pub fn missing_extensions<'a>(
    available: &[vk::ExtensionProperties],
    desired: &[&'a CStr],
) -> Vec<&'a CStr> {
    desired
        .iter()
        .copied()
        .filter(|name| !is_extension_supported(available, name))
        .collect()
}

/// API 1.3 when the loader reports it, otherwise 1.0. `None` is a 1.0 loader.
pub fn select_api_version(loader_version: Option<u32>) -> u32 {
    match loader_version {
        Some(version) if version >= vk::API_VERSION_1_3 => vk::API_VERSION_1_3,
        _ => vk::API_VERSION_1_0,
    }
}

/// Create a Vulkan instance with the given extensions and layers enabled.
///
/// Every desired extension must be available, otherwise the instance is not
/// created. Unavailable layers are skipped with a warning since they only
/// affect diagnostics.
pub fn create_vulkan_instance(
    entry: &Entry,
    app_name: &str,
    desired_extensions: &[&CStr],
    desired_layers: &[&CStr],
) -> Result<ash::Instance> {
    let available = available_instance_extensions(entry)?;
    let missing = missing_extensions(&available, desired_extensions);
    if !missing.is_empty() {
        for name in &missing {
            log::error!("Extension named '{}' is not supported by an instance object", name.to_string_lossy());
        }
        anyhow::bail!("{} instance extension(s) not supported", missing.len());
    }

    let available_layers = available_instance_layers(entry)?;
    let layers: Vec<*const std::os::raw::c_char> = desired_layers
        .iter()
        .filter(|&&wanted| {
            let found = available_layers.iter().any(|l| layer_name(l) == wanted);
            if !found {
                log::warn!("Layer '{}' is not available, skipping", wanted.to_string_lossy());
            }
            found
        })
        .map(|name| name.as_ptr())
        .collect();

    let api_version = select_api_version(entry.try_enumerate_instance_version()?);

    let app_name_cstr = CString::new(app_name)?;
    let engine_name = c"Vulkan Cookbook";

    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name_cstr)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(engine_name)
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(api_version);

    let extensions: Vec<_> = desired_extensions.iter().map(|name| name.as_ptr()).collect();

    let create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers);

    let instance = unsafe { entry.create_instance(&create_info, None) }
        .context("Could not create Vulkan instance")?;

    log::info!(
        "Created Vulkan instance (API {}.{})",
        vk::api_version_major(api_version),
        vk::api_version_minor(api_version)
    );

    Ok(instance)
}

/// Create an instance with the surface extensions needed to present to
/// windows of the given display, on top of `desired_extensions`.
pub fn create_vulkan_instance_with_wsi_extensions_enabled(
    entry: &Entry,
    display: RawDisplayHandle,
    app_name: &str,
    desired_extensions: &[&CStr],
    desired_layers: &[&CStr],
) -> Result<ash::Instance> {
    let mut extensions = desired_extensions.to_vec();
    for name in required_surface_extensions(display)? {
        if !extensions.contains(&name) {
            extensions.push(name);
        }
    }

    create_vulkan_instance(entry, app_name, &extensions, desired_layers)
}

/// Install a messenger that forwards validation warnings and errors to `log`
pub fn create_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
) -> Result<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)> {
    let debug_utils = ash::extensions::ext::DebugUtils::new(entry, instance);

    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
        .context("Could not create debug messenger")?;

    Ok((debug_utils, messenger))
}

pub fn destroy_debug_messenger(
    debug_utils: &ash::extensions::ext::DebugUtils,
    messenger: &mut vk::DebugUtilsMessengerEXT,
) {
    if *messenger != vk::DebugUtilsMessengerEXT::null() {
        unsafe { debug_utils.destroy_debug_utils_messenger(*messenger, None) };
        *messenger = vk::DebugUtilsMessengerEXT::null();
    }
}

/// The instance must outlive every object created from it; destroy it last.
pub fn destroy_vulkan_instance(instance: &ash::Instance) {
    unsafe { instance.destroy_instance(None) };
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn extension(name: &CStr) -> vk::ExtensionProperties {
        let mut props = vk::ExtensionProperties::default();
        for (dst, src) in props.extension_name.iter_mut().zip(name.to_bytes()) {
            *dst = *src as std::os::raw::c_char;
        }
        props
    }

    #[test]
    fn finds_extension_by_name() {
        let available = [extension(c"VK_KHR_surface"), extension(c"VK_EXT_debug_utils")];

        assert!(is_extension_supported(&available, c"VK_EXT_debug_utils"));
        assert!(!is_extension_supported(&available, c"VK_KHR_xlib_surface"));
        assert!(!is_extension_supported(&available, c"VK_KHR"));
    }

    #[test]
    fn reports_missing_extensions_in_request_order() {
        let available = [extension(c"VK_KHR_surface")];
        let desired = [c"VK_KHR_wayland_surface", c"VK_KHR_surface", c"VK_EXT_debug_utils"];

        let missing = missing_extensions(&available, &desired);

        assert_eq!(missing, vec![c"VK_KHR_wayland_surface", c"VK_EXT_debug_utils"]);
    }

    #[test]
    fn api_version_is_1_3_or_1_0() {
        assert_eq!(select_api_version(Some(vk::make_api_version(0, 1, 3, 250))), vk::API_VERSION_1_3);
        assert_eq!(select_api_version(Some(vk::API_VERSION_1_3)), vk::API_VERSION_1_3);
        assert_eq!(select_api_version(Some(vk::API_VERSION_1_2)), vk::API_VERSION_1_0);
        assert_eq!(select_api_version(Some(vk::API_VERSION_1_1)), vk::API_VERSION_1_0);
        assert_eq!(select_api_version(None), vk::API_VERSION_1_0);
    }

    #[test]
    fn nothing_missing_from_empty_request() {
        assert!(missing_extensions(&[], &[]).is_empty());
    }
}
