use common::{
    error::Context,
    gfx::{
        blob_bytes, compile_shader, create_device, create_immutable_buffer, create_render_target,
        create_swap_chain, max_msaa_quality, viewport, Device, DynamicBuffer, ShaderSource,
        SwapChainDesc,
    },
    os::Window,
    Error, Result,
};
use windows::{
    core::s,
    Win32::Graphics::{
        Direct3D::{
            D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST, D3D_DRIVER_TYPE_HARDWARE, D3D_DRIVER_TYPE_WARP,
            D3D_FEATURE_LEVEL, D3D_FEATURE_LEVEL_10_0, D3D_FEATURE_LEVEL_11_0,
        },
        Direct3D11::{
            ID3D11Buffer, ID3D11Device, ID3D11DeviceContext, ID3D11InputLayout,
            ID3D11PixelShader, ID3D11RenderTargetView, ID3D11VertexShader,
            D3D11_APPEND_ALIGNED_ELEMENT, D3D11_BIND_CONSTANT_BUFFER, D3D11_BIND_INDEX_BUFFER,
            D3D11_BIND_VERTEX_BUFFER, D3D11_INPUT_ELEMENT_DESC, D3D11_INPUT_PER_VERTEX_DATA,
            D3D11_VIEWPORT,
        },
        Dxgi::{
            Common::{
                DXGI_FORMAT, DXGI_FORMAT_R32G32B32_FLOAT, DXGI_FORMAT_R32G32_FLOAT,
                DXGI_FORMAT_R32_UINT, DXGI_FORMAT_R8G8B8A8_UNORM, DXGI_SAMPLE_DESC,
            },
            IDXGISwapChain, DXGI_PRESENT,
        },
    },
};

use crate::{
    scene::{Constants, Vertex, TRIANGLE_INDICES, TRIANGLE_VERTICES},
    CommandLine,
};

const FEATURE_LEVELS: [D3D_FEATURE_LEVEL; 2] = [D3D_FEATURE_LEVEL_11_0, D3D_FEATURE_LEVEL_10_0];
const BACK_BUFFER_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM;
const MSAA_SAMPLES: u32 = 4;
const REFRESH_RATE: u32 = 60;
const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

const TRIANGLE_SHADER: &[u8] = include_bytes!("../shaders/triangle.hlsl");

/// Owns the device, swap chain and everything needed to draw the triangle.
pub struct Renderer {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    swap_chain: IDXGISwapChain,
    render_target: ID3D11RenderTargetView,
    viewport: D3D11_VIEWPORT,
    vertex_shader: ID3D11VertexShader,
    pixel_shader: ID3D11PixelShader,
    input_layout: ID3D11InputLayout,
    vertex_buffer: ID3D11Buffer,
    index_buffer: ID3D11Buffer,
    constant_buffer: DynamicBuffer,
}

impl Renderer {
    pub fn new(window: &Window, command_line: &CommandLine) -> Result<Self> {
        let driver_type = if command_line.use_warp_device {
            D3D_DRIVER_TYPE_WARP
        } else {
            D3D_DRIVER_TYPE_HARDWARE
        };
        let debug = cfg!(debug_assertions) || command_line.debug;

        let Device {
            device,
            context,
            feature_level,
        } = create_device(driver_type, &FEATURE_LEVELS, debug)?;
        log::info!("created device with feature level {:#x}", feature_level.0);

        let quality = max_msaa_quality(&device, BACK_BUFFER_FORMAT, MSAA_SAMPLES)?;

        let (width, height) = window.get_physical_size();
        let swap_chain = create_swap_chain(
            &device,
            window.get_handle(),
            &SwapChainDesc {
                width: width as u32,
                height: height as u32,
                format: BACK_BUFFER_FORMAT,
                refresh_rate: REFRESH_RATE,
                samples: DXGI_SAMPLE_DESC {
                    Count: MSAA_SAMPLES,
                    Quality: quality,
                },
            },
        )?;
        let render_target = create_render_target(&device, &swap_chain)?;

        let vs_blob = compile_shader(&ShaderSource {
            code: TRIANGLE_SHADER,
            entry: "VSmain",
            target: "vs_5_0",
        })?;
        let ps_blob = compile_shader(&ShaderSource {
            code: TRIANGLE_SHADER,
            entry: "PSmain",
            target: "ps_5_0",
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
                AlignedByteOffset: 0,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("COLOR"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32B32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: D3D11_APPEND_ALIGNED_ELEMENT,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
        ];
        let mut input_layout = None;
        unsafe {
            device.CreateInputLayout(&input_elements, blob_bytes(&vs_blob), Some(&mut input_layout))
        }
        .context("CreateInputLayout")?;

        let vertex_buffer =
            create_immutable_buffer(&device, D3D11_BIND_VERTEX_BUFFER, &TRIANGLE_VERTICES)?;
        let index_buffer =
            create_immutable_buffer(&device, D3D11_BIND_INDEX_BUFFER, &TRIANGLE_INDICES)?;
        let constant_buffer = DynamicBuffer::new(
            &device,
            D3D11_BIND_CONSTANT_BUFFER,
            std::mem::size_of::<Constants>(),
        )?;

        let missing = || Error::Unsupported("pipeline creation returned nothing");
        Ok(Self {
            viewport: viewport(width as u32, height as u32),
            vertex_shader: vertex_shader.ok_or_else(missing)?,
            pixel_shader: pixel_shader.ok_or_else(missing)?,
            input_layout: input_layout.ok_or_else(missing)?,
            device,
            context,
            swap_chain,
            render_target,
            vertex_buffer,
            index_buffer,
            constant_buffer,
        })
    }

    pub fn device(&self) -> &ID3D11Device {
        &self.device
    }

    pub fn context(&self) -> &ID3D11DeviceContext {
        &self.context
    }

    pub fn upload(&self, constants: &Constants) -> Result<()> {
        self.constant_buffer
            .write(&self.context, bytemuck::bytes_of(constants))
    }

    /// Clears the back buffer and draws the triangle.
    pub fn draw(&self) {
        let stride = std::mem::size_of::<Vertex>() as u32;
        let offset = 0;
        let context = &self.context;

        unsafe {
            context.IASetInputLayout(&self.input_layout);
            context.IASetVertexBuffers(
                0,
                1,
                Some(&Some(self.vertex_buffer.clone())),
                Some(&stride),
                Some(&offset),
            );
            context.IASetIndexBuffer(&self.index_buffer, DXGI_FORMAT_R32_UINT, 0);
            context.IASetPrimitiveTopology(D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST);

            context.VSSetShader(&self.vertex_shader, None);
            context.VSSetConstantBuffers(
                0,
                Some(&[Some(self.constant_buffer.buffer().clone())]),
            );
            context.PSSetShader(&self.pixel_shader, None);

            context.RSSetViewports(Some(&[self.viewport]));
            context.OMSetRenderTargets(Some(&[Some(self.render_target.clone())]), None);

            context.ClearRenderTargetView(&self.render_target, &CLEAR_COLOR);
            context.DrawIndexed(TRIANGLE_INDICES.len() as u32, 0, 0);
        }
    }

    pub fn present(&self) {
        if let Err(e) = unsafe { self.swap_chain.Present(1, DXGI_PRESENT(0)) }.ok() {
            log::error!("failed to present the frame {e}");
        }
    }
}
