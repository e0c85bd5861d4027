// =============================================================================
// VULKAN COOKBOOK DEMO - A triangle drawn entirely with recipes
// =============================================================================
//
// The demo strings the library recipes together into a minimal renderer.
//
// SETUP:
// ┌─────────────────────────────────────────────────────────────────┐
// │  VulkanContext (instance, surface, device, queues)              │
// │    └── Swapchain + one image view per swapchain image           │
// │          └── Render pass (color + depth)                        │
// │                └── Pipeline (triangle shaders, dynamic viewport)│
// │                      └── Frame resources (cmd buffer, sync,     │
// │                          depth buffer, framebuffer) x N         │
// └─────────────────────────────────────────────────────────────────┘
//
// FRAME FLOW:
// 1. Wait for the fence of the next frame resource
// 2. Acquire swapchain image
// 3. Build a framebuffer for it and record the draw
// 4. Submit, present, rotate to the next frame resource
//
// =============================================================================

mod config;

use anyhow::{Context, Result};
use ash::vk;
use config::Config;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use vulkan_cookbook::context::VulkanContext;
use vulkan_cookbook::helpers::mesh::MeshPart;
use vulkan_cookbook::recipes::buffer::{
    create_buffer_with_memory, use_staging_buffer_to_update_buffer_with_device_local_memory_bound, BufferWithMemory,
};
use vulkan_cookbook::recipes::command::{
    allocate_command_buffers, create_command_pool, destroy_command_pool, free_command_buffers,
};
use vulkan_cookbook::recipes::drawing::{
    record_command_buffer_that_draws_geometry_with_dynamic_viewport_and_scissor_states, GeometryRecording,
    VertexBufferParameters,
};
use vulkan_cookbook::recipes::frame::{
    increase_performance_through_increasing_the_number_of_separately_rendered_frames, FrameResources, FrameTarget,
};
use vulkan_cookbook::recipes::image::{create_depth_buffer, create_image_view, destroy_image_view};
use vulkan_cookbook::recipes::pipeline::{
    create_graphics_pipeline_with_vertex_and_fragment_shaders_depth_test_and_dynamic_viewport_and_scissor,
    create_pipeline_layout, destroy_pipeline, destroy_pipeline_layout,
};
use vulkan_cookbook::recipes::render_pass::{
    color_attachment_description, create_render_pass, depth_attachment_description, destroy_framebuffer,
    destroy_render_pass, SubpassParameters,
};
use vulkan_cookbook::recipes::swapchain::{create_swapchain_for_surface, destroy_swapchain};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window, WindowAttributes},
};

/// Supported as a depth attachment by every implementation
const DEPTH_FORMAT: vk::Format = vk::Format::D16_UNORM;

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml
    let config = Config::load();

    init_logging(&config);
    log::info!("Starting Vulkan cookbook demo");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.fullscreen { "fullscreen" } else { "windowed" }
    );
    log::info!("Present mode: {}", config.graphics.present_mode);

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}

/// Initialize logging with optional file output for validation errors
fn init_logging(config: &Config) {
    use env_logger::Builder;
    use log::LevelFilter;

    let mut builder = Builder::from_default_env();
    builder.filter_level(LevelFilter::Info);
    builder.init();

    if config.debug.log_to_file {
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&config.debug.log_file)
        {
            let _ = writeln!(file, "=== Vulkan Cookbook Log ===");
            let _ = writeln!(file, "Started: {:?}", std::time::SystemTime::now());
            let _ = writeln!(file);
        }
    }
}

// =============================================================================
// GEOMETRY
// =============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: [f32; 3],
}

/// Counter-clockwise in framebuffer space, so back-face culling keeps it
const TRIANGLE: [Vertex; 3] = [
    Vertex { position: [0.0, -0.5, 0.5], color: [1.0, 0.0, 0.0] },
    Vertex { position: [-0.5, 0.5, 0.5], color: [0.0, 0.0, 1.0] },
    Vertex { position: [0.5, 0.5, 0.5], color: [0.0, 1.0, 0.0] },
];

fn vertex_bindings() -> [vk::VertexInputBindingDescription; 1] {
    [vk::VertexInputBindingDescription {
        binding: 0,
        stride: std::mem::size_of::<Vertex>() as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    }]
}

fn vertex_attributes() -> [vk::VertexInputAttributeDescription; 2] {
    [
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: std::mem::offset_of!(Vertex, position) as u32,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: std::mem::offset_of!(Vertex, color) as u32,
        },
    ]
}

// =============================================================================
// SWAPCHAIN RESOURCES
// =============================================================================

/// Swapchain plus a view for each of its images
struct SwapchainResources {
    swapchain: vk::SwapchainKHR,
    format: vk::Format,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
}

impl SwapchainResources {
    /// Views only; the swapchain itself can then be handed over as the old
    /// swapchain of its replacement.
    fn destroy_views(&mut self, device: &ash::Device) {
        for view in &mut self.image_views {
            destroy_image_view(device, view);
        }
        self.image_views.clear();
    }

    fn destroy(&mut self, context: &VulkanContext) {
        self.destroy_views(&context.device);
        destroy_swapchain(&context.swapchain_loader, &mut self.swapchain);
    }
}

/// `old_swapchain` is destroyed once the new one exists
fn create_swapchain_resources(
    context: &VulkanContext,
    config: &Config,
    size: PhysicalSize<u32>,
    old_swapchain: &mut vk::SwapchainKHR,
) -> Result<SwapchainResources> {
    let setup = create_swapchain_for_surface(
        &context.surface_loader,
        &context.swapchain_loader,
        context.physical_device,
        context.surface,
        vk::Extent2D {
            width: size.width,
            height: size.height,
        },
        vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        },
        config.present_mode(),
        config.swapchain_image_count(),
        vk::ImageUsageFlags::COLOR_ATTACHMENT,
        old_swapchain,
    )?;

    let mut resources = SwapchainResources {
        swapchain: setup.swapchain,
        format: setup.format.format,
        extent: setup.extent,
        images: setup.images,
        image_views: Vec::new(),
    };

    for &image in &resources.images {
        match create_image_view(
            &context.device,
            image,
            vk::ImageViewType::TYPE_2D,
            resources.format,
            vk::ImageAspectFlags::COLOR,
        ) {
            Ok(view) => resources.image_views.push(view),
            Err(e) => {
                resources.destroy(context);
                return Err(e);
            }
        }
    }

    Ok(resources)
}

/// One subpass writing the swapchain image and testing against depth
fn create_triangle_render_pass(device: &ash::Device, color_format: vk::Format) -> Result<vk::RenderPass> {
    let attachments = [
        color_attachment_description(color_format, vk::ImageLayout::PRESENT_SRC_KHR),
        depth_attachment_description(DEPTH_FORMAT),
    ];

    let subpass = SubpassParameters {
        pipeline_type: vk::PipelineBindPoint::GRAPHICS,
        color_attachments: vec![vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }],
        depth_stencil_attachment: Some(vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        }),
        ..Default::default()
    };

    // Wait for the presentation engine to release the image and for the
    // previous user of the depth buffer
    let dependencies = [vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        src_access_mask: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        dependency_flags: vk::DependencyFlags::empty(),
    }];

    create_render_pass(device, &attachments, &[subpass], &dependencies)
}

/// Device-local vertex buffer filled through a staging buffer
fn upload_triangle(context: &VulkanContext, command_pool: vk::CommandPool) -> Result<BufferWithMemory> {
    let data: &[u8] = bytemuck::cast_slice(&TRIANGLE);

    let mut vertex_buffer = create_buffer_with_memory(
        &context.instance,
        context.physical_device,
        &context.device,
        data.len() as vk::DeviceSize,
        vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    let mut command_buffers =
        allocate_command_buffers(&context.device, command_pool, vk::CommandBufferLevel::PRIMARY, 1)?;

    let result = use_staging_buffer_to_update_buffer_with_device_local_memory_bound(
        &context.instance,
        context.physical_device,
        &context.device,
        data,
        vertex_buffer.buffer,
        0,
        vk::AccessFlags::empty(),
        vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
        vk::PipelineStageFlags::TOP_OF_PIPE,
        vk::PipelineStageFlags::VERTEX_INPUT,
        context.graphics_queue,
        command_buffers[0],
        &[],
    );

    free_command_buffers(&context.device, command_pool, &mut command_buffers);

    match result {
        Ok(()) => Ok(vertex_buffer),
        Err(e) => {
            vertex_buffer.destroy(&context.device);
            Err(e)
        }
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Every GPU object the demo owns.
///
/// Handles start out null and are released in `Drop` with the null-safe
/// destroy recipes, so a half-finished initialization cleans up too. The
/// context must be dropped before the window.
struct App {
    // ─────────────────────────────────────────────────────────────────────────
    // CONFIGURATION
    // ─────────────────────────────────────────────────────────────────────────
    config: Config,

    // ─────────────────────────────────────────────────────────────────────────
    // VULKAN
    // ─────────────────────────────────────────────────────────────────────────
    context: Option<VulkanContext>,
    swapchain: Option<SwapchainResources>,
    render_pass: vk::RenderPass,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    vertex_buffer: Option<BufferWithMemory>,

    // ─────────────────────────────────────────────────────────────────────────
    // FRAMES
    // ─────────────────────────────────────────────────────────────────────────
    command_pool: vk::CommandPool,
    /// Command buffer, sync objects, depth buffer and framebuffer per frame
    frames: Vec<FrameResources>,
    /// Which frame resource renders next
    next_frame: usize,

    // ─────────────────────────────────────────────────────────────────────────
    // WINDOW & STATE FLAGS
    // ─────────────────────────────────────────────────────────────────────────
    window: Option<Arc<Window>>,
    is_fullscreen: bool,
    /// Set when the window is resized - triggers swapchain recreation
    needs_resize: bool,
    /// Zero-sized windows cannot have a swapchain
    is_minimized: bool,

    // ─────────────────────────────────────────────────────────────────────────
    // FPS TRACKING
    // ─────────────────────────────────────────────────────────────────────────
    frame_count: u32,
    last_frame_time: Instant,
    last_fps_update: Instant,
}

impl App {
    fn new(config: Config) -> Self {
        let is_fullscreen = config.window.fullscreen;
        let now = Instant::now();

        Self {
            config,
            context: None,
            swapchain: None,
            render_pass: vk::RenderPass::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
            vertex_buffer: None,
            command_pool: vk::CommandPool::null(),
            frames: Vec::new(),
            next_frame: 0,
            window: None,
            is_fullscreen,
            needs_resize: false,
            is_minimized: false,
            frame_count: 0,
            last_frame_time: now,
            last_fps_update: now,
        }
    }

    // =========================================================================
    // VULKAN INITIALIZATION
    // =========================================================================

    fn init_vulkan(&mut self, window: &Window) -> Result<()> {
        let display = window.display_handle().context("Window has no display handle")?.as_raw();
        let raw_window = window.window_handle().context("Window has no native handle")?.as_raw();

        self.context = Some(VulkanContext::new(
            &self.config.window.title,
            display,
            raw_window,
            self.config.debug.validation_layers,
        )?);
        let context = self.context.as_ref().context("Vulkan context missing")?;
        let device = &context.device;

        // ─────────────────────────────────────────────────────────────────────
        // Swapchain
        // ─────────────────────────────────────────────────────────────────────
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            anyhow::bail!("Window has zero size at startup");
        }
        let mut old_swapchain = vk::SwapchainKHR::null();
        let swapchain = self
            .swapchain
            .insert(create_swapchain_resources(context, &self.config, size, &mut old_swapchain)?);

        // ─────────────────────────────────────────────────────────────────────
        // Render pass + pipeline
        // ─────────────────────────────────────────────────────────────────────
        self.render_pass = create_triangle_render_pass(device, swapchain.format)?;
        self.pipeline_layout = create_pipeline_layout(device, &[], &[])?;
        self.pipeline =
            create_graphics_pipeline_with_vertex_and_fragment_shaders_depth_test_and_dynamic_viewport_and_scissor(
                device,
                &self.config.assets.vertex_shader,
                &self.config.assets.fragment_shader,
                &vertex_bindings(),
                &vertex_attributes(),
                vk::PrimitiveTopology::TRIANGLE_LIST,
                self.pipeline_layout,
                self.render_pass,
                0,
                vk::PipelineCache::null(),
            )?;

        // ─────────────────────────────────────────────────────────────────────
        // Commands + geometry
        // ─────────────────────────────────────────────────────────────────────
        // Command buffers are re-recorded every frame
        self.command_pool = create_command_pool(
            device,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            context.graphics_queue_family,
        )?;
        self.vertex_buffer = Some(upload_triangle(context, self.command_pool)?);

        // ─────────────────────────────────────────────────────────────────────
        // Frame resources
        // ─────────────────────────────────────────────────────────────────────
        let frame_count = self.config.graphics.max_frames_in_flight.max(1);
        let command_buffers = allocate_command_buffers(
            device,
            self.command_pool,
            vk::CommandBufferLevel::PRIMARY,
            frame_count as u32,
        )?;

        for command_buffer in command_buffers {
            let mut depth = create_depth_buffer(
                &context.instance,
                context.physical_device,
                device,
                DEPTH_FORMAT,
                swapchain.extent,
            )?;
            match FrameResources::new(device, command_buffer, Some(depth)) {
                Ok(frame) => self.frames.push(frame),
                Err(e) => {
                    depth.destroy(device);
                    return Err(e);
                }
            }
        }

        log::info!(
            "Vulkan initialized: {} swapchain images, {} frames in flight",
            swapchain.images.len(),
            self.frames.len()
        );

        Ok(())
    }

    // =========================================================================
    // SWAPCHAIN RECREATION
    // =========================================================================

    /// Rebuild the swapchain and everything sized to it.
    ///
    /// The render pass and pipeline survive: viewport and scissor are dynamic.
    fn recreate_swapchain(&mut self) -> Result<()> {
        let Some(window) = self.window.as_ref() else {
            return Ok(());
        };
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            self.is_minimized = true;
            return Ok(());
        }

        let context = self.context.as_ref().context("Vulkan not initialized")?;
        context.wait_idle()?;

        log::info!("Recreating swapchain: {}x{}", size.width, size.height);

        // Framebuffers reference the views about to be destroyed
        for frame in &mut self.frames {
            destroy_framebuffer(&context.device, &mut frame.framebuffer);
        }

        let mut old_swapchain = vk::SwapchainKHR::null();
        if let Some(mut previous) = self.swapchain.take() {
            previous.destroy_views(&context.device);
            old_swapchain = previous.swapchain;
        }

        let swapchain = match create_swapchain_resources(context, &self.config, size, &mut old_swapchain) {
            Ok(resources) => self.swapchain.insert(resources),
            Err(e) => {
                destroy_swapchain(&context.swapchain_loader, &mut old_swapchain);
                return Err(e);
            }
        };

        for frame in &mut self.frames {
            if let Some(depth) = frame.depth_attachment.as_mut() {
                depth.destroy(&context.device);
            }
            // Left empty if the new buffer cannot be created
            frame.depth_attachment = None;
            frame.depth_attachment = Some(create_depth_buffer(
                &context.instance,
                context.physical_device,
                &context.device,
                DEPTH_FORMAT,
                swapchain.extent,
            )?);
        }

        self.needs_resize = false;
        Ok(())
    }

    // =========================================================================
    // RENDER LOOP
    // =========================================================================

    /// Render a single frame. Returns `false` when nothing was drawn.
    fn render_frame(&mut self) -> Result<bool> {
        if self.is_minimized {
            return Ok(false);
        }

        if self.needs_resize {
            self.recreate_swapchain()?;
            if self.is_minimized {
                return Ok(false);
            }
        }

        let context = self.context.as_ref().context("Vulkan not initialized")?;
        let swapchain = self.swapchain.as_ref().context("Swapchain not initialized")?;
        let vertex_buffer = self.vertex_buffer.as_ref().context("Vertex buffer not initialized")?;

        let target = FrameTarget {
            swapchain_loader: &context.swapchain_loader,
            swapchain: swapchain.swapchain,
            swapchain_size: swapchain.extent,
            swapchain_image_views: &swapchain.image_views,
            render_pass: self.render_pass,
            graphics_queue: context.graphics_queue,
            present_queue: context.present_queue,
        };

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.config.graphics.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];
        let vertex_buffers = [VertexBufferParameters {
            buffer: vertex_buffer.buffer,
            memory_offset: 0,
        }];
        let parts = [MeshPart {
            vertex_offset: 0,
            vertex_count: TRIANGLE.len() as u32,
        }];
        let (render_pass, pipeline, pipeline_layout) = (self.render_pass, self.pipeline, self.pipeline_layout);

        let recreate = increase_performance_through_increasing_the_number_of_separately_rendered_frames(
            &context.device,
            &target,
            &mut self.frames,
            &mut self.next_frame,
            &[],
            |command_buffer, image_index, framebuffer| {
                let swapchain_image = *swapchain
                    .images
                    .get(image_index as usize)
                    .context("Acquired image index out of range")?;

                let recording = GeometryRecording {
                    swapchain_image,
                    present_queue_family: context.present_queue_family,
                    graphics_queue_family: context.graphics_queue_family,
                    render_pass,
                    framebuffer,
                    extent: swapchain.extent,
                    clear_values: &clear_values,
                    pipeline,
                    pipeline_layout,
                    descriptor_sets: &[],
                    vertex_buffers: &vertex_buffers,
                    parts: &parts,
                };

                record_command_buffer_that_draws_geometry_with_dynamic_viewport_and_scissor_states(
                    &context.device,
                    command_buffer,
                    &recording,
                )
            },
        )?;

        if recreate {
            self.needs_resize = true;
        }

        Ok(true)
    }

    // =========================================================================
    // FULLSCREEN TOGGLE
    // =========================================================================

    fn toggle_fullscreen(&mut self) {
        if let Some(ref window) = self.window {
            self.is_fullscreen = !self.is_fullscreen;

            if self.is_fullscreen {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                log::info!("Entered fullscreen mode");
            } else {
                window.set_fullscreen(None);
                log::info!("Exited fullscreen mode");
            }

            self.needs_resize = true;
        }
    }

    // =========================================================================
    // FPS TRACKING
    // =========================================================================

    fn update_fps(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }

        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        self.frame_count += 1;

        // Update title every second
        let elapsed = now.duration_since(self.last_fps_update).as_secs_f32();
        if elapsed >= 1.0 {
            let fps = self.frame_count as f32 / elapsed;

            if let Some(ref window) = self.window {
                let mode = if self.is_fullscreen { "fullscreen" } else { "windowed" };
                window.set_title(&format!(
                    "{} - {:.0} FPS ({:.2}ms) [{}]",
                    self.config.window.title,
                    fps,
                    frame_time * 1000.0,
                    mode
                ));
            }

            self.frame_count = 0;
            self.last_fps_update = now;
        }
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let mut window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(PhysicalSize::new(self.config.window.width, self.config.window.height));

        if self.config.window.fullscreen {
            window_attributes = window_attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        // Partially created objects are released by Drop
        if let Err(e) = self.init_vulkan(&window) {
            log::error!("Failed to initialize Vulkan: {:?}", e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            // ─────────────────────────────────────────────────────────────────
            // CLOSE REQUEST
            // ─────────────────────────────────────────────────────────────────
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }

            // ─────────────────────────────────────────────────────────────────
            // WINDOW RESIZED
            // ─────────────────────────────────────────────────────────────────
            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);

                if size.width == 0 || size.height == 0 {
                    self.is_minimized = true;
                } else {
                    self.is_minimized = false;
                    self.needs_resize = true;
                }
            }

            // ─────────────────────────────────────────────────────────────────
            // REDRAW REQUESTED
            // ─────────────────────────────────────────────────────────────────
            WindowEvent::RedrawRequested => match self.render_frame() {
                Ok(true) => self.update_fps(),
                Ok(false) => {}
                Err(e) => {
                    log::error!("Render error: {:?}", e);
                    event_loop.exit();
                }
            },

            // ─────────────────────────────────────────────────────────────────
            // KEYBOARD INPUT
            // ─────────────────────────────────────────────────────────────────
            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed() {
                    if let PhysicalKey::Code(key) = event.physical_key {
                        match key {
                            KeyCode::Escape => {
                                log::info!("ESC pressed, exiting...");
                                event_loop.exit();
                            }
                            KeyCode::F11 => self.toggle_fullscreen(),
                            _ => {}
                        }
                    }
                }
            }

            _ => {}
        }
    }

    /// Request continuous redraws.
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

// =============================================================================
// CLEANUP
// =============================================================================

impl Drop for App {
    fn drop(&mut self) {
        let Some(context) = self.context.as_ref() else {
            return;
        };

        log::info!("Cleaning up Vulkan resources...");

        // Wait for GPU to finish before destroying anything
        if let Err(e) = context.wait_idle() {
            log::error!("{:#}", e);
        }

        let device = &context.device;

        // Destroy in reverse order of creation; the context drops afterwards
        for frame in &mut self.frames {
            frame.destroy(device);
        }
        self.frames.clear();

        // Also frees the command buffers
        destroy_command_pool(device, &mut self.command_pool);

        if let Some(mut vertex_buffer) = self.vertex_buffer.take() {
            vertex_buffer.destroy(device);
        }
        destroy_pipeline(device, &mut self.pipeline);
        destroy_pipeline_layout(device, &mut self.pipeline_layout);
        destroy_render_pass(device, &mut self.render_pass);

        if let Some(mut swapchain) = self.swapchain.take() {
            swapchain.destroy(context);
        }

        log::info!("Cleanup complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_attributes() {
        let bindings = vertex_bindings();
        let attributes = vertex_attributes();

        assert_eq!(bindings[0].stride, 24);
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].offset, 12);
        assert_eq!(bytemuck::cast_slice::<Vertex, u8>(&TRIANGLE).len(), 72);
    }

    #[test]
    fn triangle_is_counter_clockwise_in_framebuffer_space() {
        // Twice the signed area with y pointing down; positive means CCW
        let area: f32 = (0..3)
            .map(|i| {
                let a = TRIANGLE[i].position;
                let b = TRIANGLE[(i + 1) % 3].position;
                a[0] * b[1] - b[0] * a[1]
            })
            .sum();
        assert!(-area > 0.0);
    }
}
