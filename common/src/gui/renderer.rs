use std::{ffi::c_void, mem};

use imgui::{DrawCmd, DrawCmdParams, DrawData, DrawIdx, DrawVert, TextureId, Textures};
use windows::{
    core::s,
    Win32::{
        Foundation::RECT,
        Graphics::{
            Direct3D::{D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST, D3D11_SRV_DIMENSION_TEXTURE2D},
            Direct3D11::{
                ID3D11BlendState, ID3D11DepthStencilState, ID3D11Device, ID3D11DeviceContext,
                ID3D11InputLayout, ID3D11PixelShader, ID3D11RasterizerState, ID3D11SamplerState,
                ID3D11ShaderResourceView, ID3D11Texture2D, ID3D11VertexShader,
                D3D11_BIND_CONSTANT_BUFFER, D3D11_BIND_FLAG, D3D11_BIND_INDEX_BUFFER,
                D3D11_BIND_SHADER_RESOURCE, D3D11_BIND_VERTEX_BUFFER, D3D11_BLEND_DESC,
                D3D11_BLEND_INV_SRC_ALPHA, D3D11_BLEND_ONE, D3D11_BLEND_OP_ADD,
                D3D11_BLEND_SRC_ALPHA,
                D3D11_COLOR_WRITE_ENABLE_ALL, D3D11_COMPARISON_ALWAYS, D3D11_CULL_NONE,
                D3D11_DEPTH_STENCIL_DESC, D3D11_DEPTH_WRITE_MASK_ALL, D3D11_FILL_SOLID,
                D3D11_FILTER_MIN_MAG_MIP_LINEAR, D3D11_INPUT_ELEMENT_DESC,
                D3D11_INPUT_PER_VERTEX_DATA, D3D11_RASTERIZER_DESC, D3D11_RENDER_TARGET_BLEND_DESC,
                D3D11_SAMPLER_DESC, D3D11_SHADER_RESOURCE_VIEW_DESC,
                D3D11_SHADER_RESOURCE_VIEW_DESC_0, D3D11_SUBRESOURCE_DATA, D3D11_TEX2D_SRV,
                D3D11_TEXTURE2D_DESC, D3D11_TEXTURE_ADDRESS_WRAP, D3D11_USAGE_DEFAULT,
                D3D11_VIEWPORT,
            },
            Dxgi::Common::{
                DXGI_FORMAT_R16_UINT, DXGI_FORMAT_R32G32_FLOAT, DXGI_FORMAT_R32_UINT,
                DXGI_FORMAT_R8G8B8A8_UNORM, DXGI_SAMPLE_DESC,
            },
        },
    },
};

use crate::{
    error::Context,
    gfx::{blob_bytes, compile_shader, copy_payload, DynamicBuffer, ShaderSource},
    Error, Result,
};

const VERTEX_SHADER: &[u8] = b"
cbuffer vertexBuffer : register(b0)
{
    float4x4 ProjectionMatrix;
};
struct VS_INPUT { float2 pos : POSITION; float4 col : COLOR0; float2 uv : TEXCOORD0; };
struct PS_INPUT { float4 pos : SV_POSITION; float4 col : COLOR0; float2 uv : TEXCOORD0; };
PS_INPUT main(VS_INPUT input)
{
    PS_INPUT output;
    output.pos = mul(ProjectionMatrix, float4(input.pos.xy, 0.f, 1.f));
    output.col = input.col;
    output.uv  = input.uv;
    return output;
}
";

const PIXEL_SHADER: &[u8] = b"
struct PS_INPUT { float4 pos : SV_POSITION; float4 col : COLOR0; float2 uv : TEXCOORD0; };
sampler sampler0;
Texture2D texture0;
float4 main(PS_INPUT input) : SV_Target
{
    return input.col * texture0.Sample(sampler0, input.uv);
}
";

const VERTEX_HEADROOM: usize = 5000;
const INDEX_HEADROOM: usize = 10000;

/// Draws ImGui draw data into whatever render target is currently bound.
pub struct Dx11Renderer {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    vertex_shader: ID3D11VertexShader,
    pixel_shader: ID3D11PixelShader,
    input_layout: ID3D11InputLayout,
    constant_buffer: DynamicBuffer,
    vertex_buffer: Option<DynamicBuffer>,
    index_buffer: Option<DynamicBuffer>,
    blend_state: ID3D11BlendState,
    rasterizer_state: ID3D11RasterizerState,
    depth_stencil_state: ID3D11DepthStencilState,
    sampler: ID3D11SamplerState,
    textures: Textures<ID3D11ShaderResourceView>,
}

impl Dx11Renderer {
    pub fn new(
        ctx: &mut imgui::Context,
        device: &ID3D11Device,
        context: &ID3D11DeviceContext,
    ) -> Result<Self> {
        ctx.set_renderer_name(Some(format!(
            "common-dx11 {}",
            env!("CARGO_PKG_VERSION")
        )));
        ctx.io_mut()
            .backend_flags
            .insert(imgui::BackendFlags::RENDERER_HAS_VTX_OFFSET);

        let vs_blob = compile_shader(&ShaderSource {
            code: VERTEX_SHADER,
            entry: "main",
            target: "vs_4_0",
        })?;
        let ps_blob = compile_shader(&ShaderSource {
            code: PIXEL_SHADER,
            entry: "main",
            target: "ps_4_0",
        })?;

        let mut vertex_shader = None;
        unsafe { device.CreateVertexShader(blob_bytes(&vs_blob), None, Some(&mut vertex_shader)) }
            .context("CreateVertexShader")?;
        let mut pixel_shader = None;
        unsafe { device.CreatePixelShader(blob_bytes(&ps_blob), None, Some(&mut pixel_shader)) }
            .context("CreatePixelShader")?;

        let input_elements = [
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("POSITION"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: mem::offset_of!(DrawVert, pos) as u32,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("TEXCOORD"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: mem::offset_of!(DrawVert, uv) as u32,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("COLOR"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                InputSlot: 0,
                AlignedByteOffset: mem::offset_of!(DrawVert, col) as u32,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
        ];
        let mut input_layout = None;
        unsafe {
            device.CreateInputLayout(&input_elements, blob_bytes(&vs_blob), Some(&mut input_layout))
        }
        .context("CreateInputLayout")?;

        let constant_buffer = DynamicBuffer::new(
            device,
            D3D11_BIND_CONSTANT_BUFFER,
            mem::size_of::<[[f32; 4]; 4]>(),
        )?;

        let mut blend_desc = D3D11_BLEND_DESC::default();
        blend_desc.RenderTarget[0] = D3D11_RENDER_TARGET_BLEND_DESC {
            BlendEnable: true.into(),
            SrcBlend: D3D11_BLEND_SRC_ALPHA,
            DestBlend: D3D11_BLEND_INV_SRC_ALPHA,
            BlendOp: D3D11_BLEND_OP_ADD,
            SrcBlendAlpha: D3D11_BLEND_ONE,
            DestBlendAlpha: D3D11_BLEND_INV_SRC_ALPHA,
            BlendOpAlpha: D3D11_BLEND_OP_ADD,
            RenderTargetWriteMask: D3D11_COLOR_WRITE_ENABLE_ALL.0 as u8,
        };
        let mut blend_state = None;
        unsafe { device.CreateBlendState(&blend_desc, Some(&mut blend_state)) }
            .context("CreateBlendState")?;

        let rasterizer_desc = D3D11_RASTERIZER_DESC {
            FillMode: D3D11_FILL_SOLID,
            CullMode: D3D11_CULL_NONE,
            ScissorEnable: true.into(),
            DepthClipEnable: true.into(),
            ..Default::default()
        };
        let mut rasterizer_state = None;
        unsafe { device.CreateRasterizerState(&rasterizer_desc, Some(&mut rasterizer_state)) }
            .context("CreateRasterizerState")?;

        let depth_stencil_desc = D3D11_DEPTH_STENCIL_DESC {
            DepthEnable: false.into(),
            DepthWriteMask: D3D11_DEPTH_WRITE_MASK_ALL,
            DepthFunc: D3D11_COMPARISON_ALWAYS,
            StencilEnable: false.into(),
            ..Default::default()
        };
        let mut depth_stencil_state = None;
        unsafe {
            device.CreateDepthStencilState(&depth_stencil_desc, Some(&mut depth_stencil_state))
        }
        .context("CreateDepthStencilState")?;

        let sampler_desc = D3D11_SAMPLER_DESC {
            Filter: D3D11_FILTER_MIN_MAG_MIP_LINEAR,
            AddressU: D3D11_TEXTURE_ADDRESS_WRAP,
            AddressV: D3D11_TEXTURE_ADDRESS_WRAP,
            AddressW: D3D11_TEXTURE_ADDRESS_WRAP,
            ComparisonFunc: D3D11_COMPARISON_ALWAYS,
            ..Default::default()
        };
        let mut sampler = None;
        unsafe { device.CreateSamplerState(&sampler_desc, Some(&mut sampler)) }
            .context("CreateSamplerState")?;

        let missing = || Error::Unsupported("overlay resource creation returned nothing");
        let mut renderer = Self {
            device: device.clone(),
            context: context.clone(),
            vertex_shader: vertex_shader.ok_or_else(missing)?,
            pixel_shader: pixel_shader.ok_or_else(missing)?,
            input_layout: input_layout.ok_or_else(missing)?,
            constant_buffer,
            vertex_buffer: None,
            index_buffer: None,
            blend_state: blend_state.ok_or_else(missing)?,
            rasterizer_state: rasterizer_state.ok_or_else(missing)?,
            depth_stencil_state: depth_stencil_state.ok_or_else(missing)?,
            sampler: sampler.ok_or_else(missing)?,
            textures: Textures::new(),
        };

        let font_texture = renderer.upload_fonts(ctx)?;
        ctx.fonts().tex_id = renderer.textures.insert(font_texture);

        Ok(renderer)
    }

    fn upload_fonts(&self, ctx: &mut imgui::Context) -> Result<ID3D11ShaderResourceView> {
        let fonts = ctx.fonts();
        let atlas = fonts.build_rgba32_texture();

        let desc = D3D11_TEXTURE2D_DESC {
            Width: atlas.width,
            Height: atlas.height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: D3D11_BIND_SHADER_RESOURCE.0 as u32,
            ..Default::default()
        };
        let init = D3D11_SUBRESOURCE_DATA {
            pSysMem: atlas.data.as_ptr() as *const c_void,
            SysMemPitch: atlas.width * 4,
            SysMemSlicePitch: 0,
        };

        let mut texture: Option<ID3D11Texture2D> = None;
        unsafe { self.device.CreateTexture2D(&desc, Some(&init), Some(&mut texture)) }
            .context("CreateTexture2D")?;
        let texture = texture.ok_or(Error::Unsupported("CreateTexture2D returned no texture"))?;

        let srv_desc = D3D11_SHADER_RESOURCE_VIEW_DESC {
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            ViewDimension: D3D11_SRV_DIMENSION_TEXTURE2D,
            Anonymous: D3D11_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture2D: D3D11_TEX2D_SRV {
                    MostDetailedMip: 0,
                    MipLevels: 1,
                },
            },
        };
        let mut view = None;
        unsafe { self.device.CreateShaderResourceView(&texture, Some(&srv_desc), Some(&mut view)) }
            .context("CreateShaderResourceView")?;

        log::debug!("overlay font atlas uploaded ({}x{})", atlas.width, atlas.height);
        view.ok_or(Error::Unsupported("CreateShaderResourceView returned no view"))
    }

    /// Grows `slot` so it holds at least `count` elements of `T`.
    fn reserve<T>(
        device: &ID3D11Device,
        slot: &mut Option<DynamicBuffer>,
        bind: D3D11_BIND_FLAG,
        count: usize,
        headroom: usize,
    ) -> Result<()> {
        let needed = count * mem::size_of::<T>();
        if slot.as_ref().is_some_and(|b| b.capacity() >= needed) {
            return Ok(());
        }

        let capacity = (count + headroom) * mem::size_of::<T>();
        *slot = Some(DynamicBuffer::new(device, bind, capacity)?);
        Ok(())
    }

    pub fn render(&mut self, draw_data: &DrawData) -> Result<()> {
        let [width, height] = draw_data.display_size;
        if width <= 0.0 || height <= 0.0 || draw_data.total_vtx_count == 0 {
            return Ok(());
        }

        let total_vtx = draw_data.total_vtx_count as usize;
        let total_idx = draw_data.total_idx_count as usize;
        Self::reserve::<DrawVert>(
            &self.device,
            &mut self.vertex_buffer,
            D3D11_BIND_VERTEX_BUFFER,
            total_vtx,
            VERTEX_HEADROOM,
        )?;
        Self::reserve::<DrawIdx>(
            &self.device,
            &mut self.index_buffer,
            D3D11_BIND_INDEX_BUFFER,
            total_idx,
            INDEX_HEADROOM,
        )?;

        let (Some(vertex_buffer), Some(index_buffer)) = (&self.vertex_buffer, &self.index_buffer)
        else {
            return Ok(());
        };

        {
            let mut vertices = vertex_buffer.map(&self.context)?;
            let mut indices = index_buffer.map(&self.context)?;
            let (mut vtx_offset, mut idx_offset) = (0, 0);

            for draw_list in draw_data.draw_lists() {
                let vtx = as_bytes(draw_list.vtx_buffer());
                copy_payload(&mut vertices.as_bytes_mut()[vtx_offset..], vtx)?;
                vtx_offset += vtx.len();

                let idx = as_bytes(draw_list.idx_buffer());
                copy_payload(&mut indices.as_bytes_mut()[idx_offset..], idx)?;
                idx_offset += idx.len();
            }
        }

        self.constant_buffer
            .write(&self.context, bytemuck::bytes_of(&projection(draw_data)))?;

        self.setup_render_state(draw_data);

        let clip_off = draw_data.display_pos;
        let mut global_vtx_offset = 0;
        let mut global_idx_offset = 0;

        for draw_list in draw_data.draw_lists() {
            for cmd in draw_list.commands() {
                match cmd {
                    DrawCmd::Elements {
                        count,
                        cmd_params:
                            DrawCmdParams {
                                clip_rect,
                                texture_id,
                                vtx_offset,
                                idx_offset,
                            },
                    } => {
                        let scissor = RECT {
                            left: (clip_rect[0] - clip_off[0]) as i32,
                            top: (clip_rect[1] - clip_off[1]) as i32,
                            right: (clip_rect[2] - clip_off[0]) as i32,
                            bottom: (clip_rect[3] - clip_off[1]) as i32,
                        };
                        if scissor.right <= scissor.left || scissor.bottom <= scissor.top {
                            continue;
                        }

                        let Some(texture) = self.lookup_texture(texture_id) else {
                            log::warn!("overlay draw with unknown texture {texture_id:?}");
                            continue;
                        };

                        unsafe {
                            self.context.RSSetScissorRects(Some(&[scissor]));
                            self.context
                                .PSSetShaderResources(0, Some(&[Some(texture.clone())]));
                            self.context.DrawIndexed(
                                count as u32,
                                (global_idx_offset + idx_offset) as u32,
                                (global_vtx_offset + vtx_offset) as i32,
                            );
                        }
                    }
                    DrawCmd::ResetRenderState => self.setup_render_state(draw_data),
                    DrawCmd::RawCallback { callback, raw_cmd } => unsafe {
                        callback(draw_list.raw(), raw_cmd)
                    },
                }
            }
            global_vtx_offset += draw_list.vtx_buffer().len();
            global_idx_offset += draw_list.idx_buffer().len();
        }

        self.restore_render_state();

        Ok(())
    }

    fn lookup_texture(&self, texture_id: TextureId) -> Option<&ID3D11ShaderResourceView> {
        self.textures.get(texture_id)
    }

    fn setup_render_state(&self, draw_data: &DrawData) {
        let viewport = D3D11_VIEWPORT {
            TopLeftX: 0.0,
            TopLeftY: 0.0,
            Width: draw_data.display_size[0],
            Height: draw_data.display_size[1],
            MinDepth: 0.0,
            MaxDepth: 1.0,
        };
        let stride = mem::size_of::<DrawVert>() as u32;
        let offset = 0;
        let index_format = if mem::size_of::<DrawIdx>() == 2 {
            DXGI_FORMAT_R16_UINT
        } else {
            DXGI_FORMAT_R32_UINT
        };

        let context = &self.context;
        unsafe {
            context.RSSetViewports(Some(&[viewport]));
            context.IASetInputLayout(&self.input_layout);
            context.IASetVertexBuffers(
                0,
                1,
                Some(&self.vertex_buffer.as_ref().map(|b| b.buffer().clone())),
                Some(&stride),
                Some(&offset),
            );
            if let Some(index_buffer) = &self.index_buffer {
                context.IASetIndexBuffer(index_buffer.buffer(), index_format, 0);
            }
            context.IASetPrimitiveTopology(D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
            context.VSSetShader(&self.vertex_shader, None);
            context.VSSetConstantBuffers(0, Some(&[Some(self.constant_buffer.buffer().clone())]));
            context.PSSetShader(&self.pixel_shader, None);
            context.PSSetSamplers(0, Some(&[Some(self.sampler.clone())]));
            context.OMSetBlendState(&self.blend_state, None, u32::MAX);
            context.OMSetDepthStencilState(&self.depth_stencil_state, 0);
            context.RSSetState(&self.rasterizer_state);
        }
    }

    /// Puts back the default states the scene pass relies on.
    fn restore_render_state(&self) {
        unsafe {
            self.context.RSSetState(None);
            self.context.OMSetBlendState(None, None, u32::MAX);
            self.context.OMSetDepthStencilState(None, 0);
        }
    }
}

/// Orthographic projection mapping the ImGui display rectangle to clip space.
fn projection(draw_data: &DrawData) -> [[f32; 4]; 4] {
    let l = draw_data.display_pos[0];
    let r = draw_data.display_pos[0] + draw_data.display_size[0];
    let t = draw_data.display_pos[1];
    let b = draw_data.display_pos[1] + draw_data.display_size[1];

    [
        [2.0 / (r - l), 0.0, 0.0, 0.0],
        [0.0, 2.0 / (t - b), 0.0, 0.0],
        [0.0, 0.0, 0.5, 0.0],
        [(r + l) / (l - r), (t + b) / (b - t), 0.5, 1.0],
    ]
}

fn as_bytes<T>(items: &[T]) -> &[u8] {
    // SAFETY: ImGui vertex and index types are plain `repr(C)` data.
    unsafe { std::slice::from_raw_parts(items.as_ptr() as *const u8, mem::size_of_val(items)) }
}
