// SPDX-License-Identifier: CEPL-1.0
//! The fixed triangle pipeline and the registry that owns built pipelines.

use std::collections::HashMap;
use std::io::Cursor;

use ash::util::read_spv;
use ash::vk;
use ashlands_render::{ShaderLoader, ShaderStage};
use bytemuck::{Pod, Zeroable};
use tracing::{debug, info};

use crate::error::{DriverError, Result};

const ENTRY_POINT: &std::ffi::CStr = c"main";

/// Interleaved vertex consumed by the pipeline: position then normal (or
/// color), three floats each.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
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
                offset: std::mem::offset_of!(Vertex, normal) as u32,
            },
        ]
    }
}

/// Layout + pipeline pair. Both are destroyed together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineObject {
    pub layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
}

impl PipelineObject {
    /// # Safety
    /// The device must be valid and the pipeline must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Loads and decodes one stage of `name`.
pub fn load_spirv(loader: &dyn ShaderLoader, name: &str, stage: ShaderStage) -> Result<Vec<u32>> {
    let path = loader.locate(name, stage);
    let bytes = loader
        .load(name, stage)
        .map_err(|source| DriverError::ShaderLoad { path: path.clone(), source })?;
    read_spv(&mut Cursor::new(&bytes[..])).map_err(|source| DriverError::ShaderLoad { path, source })
}

unsafe fn create_shader_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule> {
    let info = vk::ShaderModuleCreateInfo::default().code(code);
    unsafe { device.create_shader_module(&info, None) }
        .map_err(DriverError::vulkan("vkCreateShaderModule"))
}

/// Viewport and scissor are set per frame.
pub const DYNAMIC_STATES: [vk::DynamicState; 2] =
    [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];

/// No descriptor sets, no push constants.
pub fn layout_info() -> vk::PipelineLayoutCreateInfo<'static> {
    vk::PipelineLayoutCreateInfo::default()
}

pub fn input_assembly_state() -> vk::PipelineInputAssemblyStateCreateInfo<'static> {
    vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false)
}

pub fn rasterization_state() -> vk::PipelineRasterizationStateCreateInfo<'static> {
    vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .depth_bias_enable(false)
        .line_width(1.0)
}

pub fn multisample_state() -> vk::PipelineMultisampleStateCreateInfo<'static> {
    vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1)
        .sample_shading_enable(false)
}

/// Opaque writes to all four channels.
pub fn color_blend_attachment() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(false)
        .color_write_mask(
            vk::ColorComponentFlags::R
                | vk::ColorComponentFlags::G
                | vk::ColorComponentFlags::B
                | vk::ColorComponentFlags::A,
        )
}

/// Builds the triangle pipeline from `<name>.vert.spv` / `<name>.frag.spv`,
/// rendering into one color attachment of `color_format`.
///
/// # Safety
/// The device must be valid and have dynamic rendering enabled.
pub unsafe fn build_pipeline(
    device: &ash::Device,
    loader: &dyn ShaderLoader,
    name: &str,
    color_format: vk::Format,
) -> Result<PipelineObject> {
    // Decode both stages before creating anything on the device.
    let vs_code = load_spirv(loader, name, ShaderStage::Vertex)?;
    let fs_code = load_spirv(loader, name, ShaderStage::Fragment)?;

    let layout = unsafe { device.create_pipeline_layout(&layout_info(), None) }
        .map_err(DriverError::vulkan("vkCreatePipelineLayout"))?;

    let vs = match unsafe { create_shader_module(device, &vs_code) } {
        Ok(module) => module,
        Err(err) => {
            unsafe { device.destroy_pipeline_layout(layout, None) };
            return Err(err);
        }
    };
    let fs = match unsafe { create_shader_module(device, &fs_code) } {
        Ok(module) => module,
        Err(err) => {
            unsafe {
                device.destroy_shader_module(vs, None);
                device.destroy_pipeline_layout(layout, None);
            }
            return Err(err);
        }
    };

    let stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vs)
            .name(ENTRY_POINT),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(fs)
            .name(ENTRY_POINT),
    ];

    // --- Fixed-function state ---
    let bindings = [Vertex::binding_description()];
    let attributes = Vertex::attribute_descriptions();
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&attributes);

    let input_assembly = input_assembly_state();
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&DYNAMIC_STATES);
    let rasterization = rasterization_state();
    let multisample = multisample_state();

    let blend_attachments = [color_blend_attachment()];
    let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(&blend_attachments);

    // --- Dynamic rendering target (replaces a render pass) ---
    let color_formats = [color_format];
    let mut rendering =
        vk::PipelineRenderingCreateInfo::default().color_attachment_formats(&color_formats);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization)
        .multisample_state(&multisample)
        .color_blend_state(&color_blend)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .push_next(&mut rendering);

    let created = unsafe {
        device.create_graphics_pipelines(
            vk::PipelineCache::null(),
            std::slice::from_ref(&pipeline_info),
            None,
        )
    };

    // Modules are only needed while the pipeline is compiled.
    unsafe {
        device.destroy_shader_module(vs, None);
        device.destroy_shader_module(fs, None);
    }

    let pipeline = match created {
        Ok(pipelines) => pipelines[0],
        Err((pipelines, result)) => {
            unsafe {
                for pipeline in pipelines.into_iter().filter(|p| *p != vk::Pipeline::null()) {
                    device.destroy_pipeline(pipeline, None);
                }
                device.destroy_pipeline_layout(layout, None);
            }
            return Err(DriverError::vulkan("vkCreateGraphicsPipelines")(result));
        }
    };

    info!("pipeline '{name}' built for {color_format:?}");
    Ok(PipelineObject { layout, pipeline })
}

/// Opaque key for a pipeline owned by the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineHandle(u64);

/// Every pipeline the driver has built and not yet destroyed.
#[derive(Debug, Default)]
pub struct PipelineRegistry {
    next: u64,
    entries: HashMap<PipelineHandle, (String, PipelineObject)>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, object: PipelineObject) -> PipelineHandle {
        self.next += 1;
        let handle = PipelineHandle(self.next);
        debug!("registered pipeline '{name}' as {handle:?}");
        self.entries.insert(handle, (name.to_string(), object));
        handle
    }

    pub fn get(&self, handle: PipelineHandle) -> Option<&PipelineObject> {
        self.entries.get(&handle).map(|(_, object)| object)
    }

    pub fn name(&self, handle: PipelineHandle) -> Option<&str> {
        self.entries.get(&handle).map(|(name, _)| name.as_str())
    }

    pub fn remove(&mut self, handle: PipelineHandle) -> Option<PipelineObject> {
        self.entries.remove(&handle).map(|(_, object)| object)
    }

    /// Empties the registry, yielding every remaining pipeline once.
    pub fn drain(&mut self) -> impl Iterator<Item = PipelineObject> + '_ {
        self.entries.drain().map(|(_, (_, object))| object)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
