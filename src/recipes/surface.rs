// Presentation surface recipes
//
// Connects a window-system window with Vulkan. Handles come from
// raw-window-handle so any windowing library can be used.

use anyhow::{Context, Result};
use ash::{vk, Entry};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::CStr;

/// Instance extensions needed to create a surface on `display`
pub fn required_surface_extensions(display: RawDisplayHandle) -> Result<Vec<&'static CStr>> {
    use ash::extensions::khr;

    let platform = match display {
        RawDisplayHandle::Windows(_) => khr::Win32Surface::name(),
        RawDisplayHandle::Xlib(_) => khr::XlibSurface::name(),
        RawDisplayHandle::Xcb(_) => khr::XcbSurface::name(),
        RawDisplayHandle::Wayland(_) => khr::WaylandSurface::name(),
        other => anyhow::bail!("Unsupported display handle: {:?}", other),
    };

    Ok(vec![khr::Surface::name(), platform])
}

/// Create a presentation surface for a native window.
///
/// The instance must have been created with the extensions returned by
/// [`required_surface_extensions`] for the same display.
pub fn create_presentation_surface(
    entry: &Entry,
    instance: &ash::Instance,
    display: RawDisplayHandle,
    window: RawWindowHandle,
) -> Result<vk::SurfaceKHR> {
    use ash::extensions::khr;

    let surface = unsafe {
        match (display, window) {
            (RawDisplayHandle::Windows(_), RawWindowHandle::Win32(handle)) => {
                let hinstance = handle.hinstance.map(|h| h.get()).unwrap_or(0) as *const std::ffi::c_void;
                let hwnd = handle.hwnd.get() as *const std::ffi::c_void;
                let create_info = vk::Win32SurfaceCreateInfoKHR::builder()
                    .hinstance(hinstance)
                    .hwnd(hwnd);
                khr::Win32Surface::new(entry, instance).create_win32_surface(&create_info, None)
            }
            (RawDisplayHandle::Xlib(display), RawWindowHandle::Xlib(handle)) => {
                let dpy = display
                    .display
                    .context("Xlib display handle has no display pointer")?
                    .as_ptr()
                    .cast();
                let create_info = vk::XlibSurfaceCreateInfoKHR::builder()
                    .dpy(dpy)
                    .window(handle.window);
                khr::XlibSurface::new(entry, instance).create_xlib_surface(&create_info, None)
            }
            (RawDisplayHandle::Xcb(display), RawWindowHandle::Xcb(handle)) => {
                let connection = display
                    .connection
                    .context("XCB display handle has no connection")?
                    .as_ptr()
                    .cast();
                let create_info = vk::XcbSurfaceCreateInfoKHR::builder()
                    .connection(connection)
                    .window(handle.window.get());
                khr::XcbSurface::new(entry, instance).create_xcb_surface(&create_info, None)
            }
            (RawDisplayHandle::Wayland(display), RawWindowHandle::Wayland(handle)) => {
                let create_info = vk::WaylandSurfaceCreateInfoKHR::builder()
                    .display(display.display.as_ptr().cast())
                    .surface(handle.surface.as_ptr().cast());
                khr::WaylandSurface::new(entry, instance).create_wayland_surface(&create_info, None)
            }
            _ => anyhow::bail!("Unsupported window handle type"),
        }
    }
    .context("Could not create presentation surface")?;

    log::debug!("Created presentation surface");
    Ok(surface)
}

pub fn destroy_presentation_surface(
    surface_loader: &ash::extensions::khr::Surface,
    surface: &mut vk::SurfaceKHR,
) {
    if *surface != vk::SurfaceKHR::null() {
        unsafe { surface_loader.destroy_surface(*surface, None) };
        *surface = vk::SurfaceKHR::null();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw_window_handle::{WaylandDisplayHandle, WindowsDisplayHandle, XlibDisplayHandle};
    use std::ptr::NonNull;

    #[test]
    fn windows_needs_win32_surface() {
        let display = RawDisplayHandle::Windows(WindowsDisplayHandle::new());
        let names = required_surface_extensions(display).unwrap();
        assert_eq!(names, vec![c"VK_KHR_surface", c"VK_KHR_win32_surface"]);
    }

    #[test]
    fn xlib_needs_xlib_surface() {
        let display = RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0));
        let names = required_surface_extensions(display).unwrap();
        assert_eq!(names[1], c"VK_KHR_xlib_surface");
    }

    #[test]
    fn wayland_needs_wayland_surface() {
        let mut dummy = 0u8;
        let ptr = NonNull::from(&mut dummy).cast();
        let display = RawDisplayHandle::Wayland(WaylandDisplayHandle::new(ptr));
        let names = required_surface_extensions(display).unwrap();
        assert_eq!(names[1], c"VK_KHR_wayland_surface");
    }

    #[test]
    fn unsupported_display_is_rejected() {
        let display = RawDisplayHandle::Web(raw_window_handle::WebDisplayHandle::new());
        assert!(required_surface_extensions(display).is_err());
    }
}
