use std::{ffi::c_void, marker::PhantomData};

use bytemuck::Pod;
use windows::{
    core::{Interface, PCSTR},
    Win32::{
        Foundation::{HMODULE, HWND},
        Graphics::{
            Direct3D::{Fxc::D3DCompile, ID3DBlob, D3D_DRIVER_TYPE, D3D_FEATURE_LEVEL},
            Direct3D11::{
                D3D11CreateDevice, ID3D11Buffer, ID3D11Device, ID3D11DeviceContext,
                ID3D11RenderTargetView, ID3D11Texture2D, D3D11_BIND_FLAG, D3D11_BUFFER_DESC,
                D3D11_CPU_ACCESS_WRITE, D3D11_CREATE_DEVICE_DEBUG, D3D11_CREATE_DEVICE_FLAG,
                D3D11_MAPPED_SUBRESOURCE, D3D11_MAP_WRITE_DISCARD, D3D11_SDK_VERSION,
                D3D11_SUBRESOURCE_DATA, D3D11_USAGE_DYNAMIC, D3D11_USAGE_IMMUTABLE,
                D3D11_VIEWPORT,
            },
            Dxgi::{
                Common::{DXGI_FORMAT, DXGI_MODE_DESC, DXGI_RATIONAL, DXGI_SAMPLE_DESC},
                IDXGIDevice, IDXGIFactory, IDXGISwapChain, DXGI_SWAP_CHAIN_DESC,
                DXGI_SWAP_EFFECT_DISCARD, DXGI_USAGE_RENDER_TARGET_OUTPUT,
            },
        },
    },
};

use super::{check_fits, copy_payload};
use crate::{error::Context, util::AsCString, Error, Result};

/// Shader text plus the entry point to compile from it.
#[derive(Clone, Copy, Debug)]
pub struct ShaderSource<'a> {
    pub code: &'a [u8],
    pub entry: &'a str,
    pub target: &'a str,
}

pub fn compile_shader(shader: &ShaderSource) -> Result<ID3DBlob> {
    let entry = shader.entry.as_c_string();
    let target = shader.target.as_c_string();

    let mut code: Option<ID3DBlob> = None;
    let mut errors: Option<ID3DBlob> = None;
    let result = unsafe {
        D3DCompile(
            shader.code.as_ptr() as *const c_void,
            shader.code.len(),
            None,
            None,
            None,
            PCSTR(entry.as_ptr() as _),
            PCSTR(target.as_ptr() as _),
            0,
            0,
            &mut code,
            Some(&mut errors),
        )
    };

    if let Err(e) = result {
        let message = errors
            .as_ref()
            .map(|blob| {
                String::from_utf8_lossy(blob_bytes(blob))
                    .trim_end_matches('\0')
                    .trim()
                    .to_string()
            })
            .unwrap_or_else(|| e.to_string());
        return Err(Error::ShaderCompile {
            entry: shader.entry.to_string(),
            message,
        });
    }

    code.ok_or(Error::Unsupported("D3DCompile returned no bytecode"))
}

pub fn blob_bytes(blob: &ID3DBlob) -> &[u8] {
    // SAFETY: the slice borrows `blob`, which keeps the allocation alive.
    unsafe {
        std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize())
    }
}

pub struct Device {
    pub device: ID3D11Device,
    pub context: ID3D11DeviceContext,
    pub feature_level: D3D_FEATURE_LEVEL,
}

/// Creates a device and immediate context. `feature_levels` is ordered
/// highest first; the runtime picks the first one the adapter supports.
pub fn create_device(
    driver_type: D3D_DRIVER_TYPE,
    feature_levels: &[D3D_FEATURE_LEVEL],
    debug: bool,
) -> Result<Device> {
    let flags = if debug {
        D3D11_CREATE_DEVICE_DEBUG
    } else {
        D3D11_CREATE_DEVICE_FLAG(0)
    };

    let mut device: Option<ID3D11Device> = None;
    let mut context: Option<ID3D11DeviceContext> = None;
    let mut feature_level = D3D_FEATURE_LEVEL::default();
    unsafe {
        D3D11CreateDevice(
            None,
            driver_type,
            HMODULE::default(),
            flags,
            Some(feature_levels),
            D3D11_SDK_VERSION,
            Some(&mut device),
            Some(&mut feature_level),
            Some(&mut context),
        )
    }
    .context("D3D11CreateDevice")?;

    match (device, context) {
        (Some(device), Some(context)) => Ok(Device {
            device,
            context,
            feature_level,
        }),
        _ => Err(Error::Unsupported("D3D11CreateDevice returned no device")),
    }
}

/// Highest multisample quality index supported for `format` at `count`
/// samples.
pub fn max_msaa_quality(device: &ID3D11Device, format: DXGI_FORMAT, count: u32) -> Result<u32> {
    let levels = unsafe { device.CheckMultisampleQualityLevels(format, count) }
        .context("CheckMultisampleQualityLevels")?;

    levels
        .checked_sub(1)
        .ok_or(Error::Unsupported("multisample count not supported by the adapter"))
}

#[derive(Clone, Copy, Debug)]
pub struct SwapChainDesc {
    pub width: u32,
    pub height: u32,
    pub format: DXGI_FORMAT,
    pub refresh_rate: u32,
    pub samples: DXGI_SAMPLE_DESC,
}

/// Creates a single-buffer, windowed, discard-on-present swap chain through
/// the factory that owns `device`'s adapter.
pub fn create_swap_chain(
    device: &ID3D11Device,
    hwnd: HWND,
    desc: &SwapChainDesc,
) -> Result<IDXGISwapChain> {
    let dxgi_device: IDXGIDevice = device.cast().context("IDXGIDevice")?;
    let adapter = unsafe { dxgi_device.GetAdapter() }.context("IDXGIDevice::GetAdapter")?;
    let factory: IDXGIFactory =
        unsafe { adapter.GetParent() }.context("IDXGIAdapter::GetParent")?;

    let swap_chain_desc = DXGI_SWAP_CHAIN_DESC {
        BufferDesc: DXGI_MODE_DESC {
            Width: desc.width,
            Height: desc.height,
            RefreshRate: DXGI_RATIONAL {
                Numerator: desc.refresh_rate,
                Denominator: 1,
            },
            Format: desc.format,
            ..Default::default()
        },
        SampleDesc: desc.samples,
        BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
        BufferCount: 1,
        OutputWindow: hwnd,
        Windowed: true.into(),
        SwapEffect: DXGI_SWAP_EFFECT_DISCARD,
        Flags: 0,
    };

    let mut swap_chain: Option<IDXGISwapChain> = None;
    unsafe { factory.CreateSwapChain(device, &swap_chain_desc, &mut swap_chain) }
        .ok()
        .context("CreateSwapChain")?;

    swap_chain.ok_or(Error::Unsupported("CreateSwapChain returned no swap chain"))
}

pub fn create_render_target(
    device: &ID3D11Device,
    swap_chain: &IDXGISwapChain,
) -> Result<ID3D11RenderTargetView> {
    let back_buffer: ID3D11Texture2D =
        unsafe { swap_chain.GetBuffer(0) }.context("GetBuffer")?;

    let mut render_target: Option<ID3D11RenderTargetView> = None;
    unsafe { device.CreateRenderTargetView(&back_buffer, None, Some(&mut render_target)) }
        .context("CreateRenderTargetView")?;

    render_target.ok_or(Error::Unsupported("CreateRenderTargetView returned no view"))
}

pub fn viewport(width: u32, height: u32) -> D3D11_VIEWPORT {
    D3D11_VIEWPORT {
        TopLeftX: 0.0,
        TopLeftY: 0.0,
        Width: width as f32,
        Height: height as f32,
        MinDepth: 0.0,
        MaxDepth: 1.0,
    }
}

/// GPU-only buffer initialized from `data` and never written again.
pub fn create_immutable_buffer<T: Pod>(
    device: &ID3D11Device,
    bind: D3D11_BIND_FLAG,
    data: &[T],
) -> Result<ID3D11Buffer> {
    let bytes: &[u8] = bytemuck::cast_slice(data);
    let desc = D3D11_BUFFER_DESC {
        ByteWidth: bytes.len() as u32,
        Usage: D3D11_USAGE_IMMUTABLE,
        BindFlags: bind.0 as u32,
        ..Default::default()
    };
    let init = D3D11_SUBRESOURCE_DATA {
        pSysMem: bytes.as_ptr() as *const c_void,
        ..Default::default()
    };

    let mut buffer: Option<ID3D11Buffer> = None;
    unsafe { device.CreateBuffer(&desc, Some(&init), Some(&mut buffer)) }
        .context("CreateBuffer")?;

    buffer.ok_or(Error::Unsupported("CreateBuffer returned no buffer"))
}

/// CPU-writable buffer refilled with write-discard mappings.
pub struct DynamicBuffer {
    buffer: ID3D11Buffer,
    capacity: usize,
}

impl DynamicBuffer {
    pub fn new(device: &ID3D11Device, bind: D3D11_BIND_FLAG, capacity: usize) -> Result<Self> {
        let desc = D3D11_BUFFER_DESC {
            ByteWidth: capacity as u32,
            Usage: D3D11_USAGE_DYNAMIC,
            BindFlags: bind.0 as u32,
            CPUAccessFlags: D3D11_CPU_ACCESS_WRITE.0 as u32,
            ..Default::default()
        };

        let mut buffer: Option<ID3D11Buffer> = None;
        unsafe { device.CreateBuffer(&desc, None, Some(&mut buffer)) }.context("CreateBuffer")?;

        let buffer = buffer.ok_or(Error::Unsupported("CreateBuffer returned no buffer"))?;
        Ok(Self { buffer, capacity })
    }

    pub fn buffer(&self) -> &ID3D11Buffer {
        &self.buffer
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Maps the whole buffer for writing, discarding its previous contents.
    pub fn map<'a>(&'a self, context: &'a ID3D11DeviceContext) -> Result<MappedBuffer<'a>> {
        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        unsafe { context.Map(&self.buffer, 0, D3D11_MAP_WRITE_DISCARD, 0, Some(&mut mapped)) }
            .context("Map")?;

        Ok(MappedBuffer {
            context,
            buffer: &self.buffer,
            data: mapped.pData as *mut u8,
            len: self.capacity,
            _marker: PhantomData,
        })
    }

    /// Replaces the buffer contents with `bytes`. Oversized payloads are
    /// rejected before anything is mapped.
    pub fn write(&self, context: &ID3D11DeviceContext, bytes: &[u8]) -> Result<()> {
        check_fits(bytes.len(), self.capacity)?;
        let mut mapped = self.map(context)?;
        copy_payload(mapped.as_bytes_mut(), bytes)
    }
}

/// Live write mapping of a [`DynamicBuffer`]; unmapped on drop.
pub struct MappedBuffer<'a> {
    context: &'a ID3D11DeviceContext,
    buffer: &'a ID3D11Buffer,
    data: *mut u8,
    len: usize,
    _marker: PhantomData<&'a mut [u8]>,
}

impl MappedBuffer<'_> {
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: the mapping covers the buffer's full byte width and stays
        // valid until `Unmap` in `drop`.
        unsafe { std::slice::from_raw_parts_mut(self.data, self.len) }
    }
}

impl Drop for MappedBuffer<'_> {
    fn drop(&mut self) {
        unsafe { self.context.Unmap(self.buffer, 0) };
    }
}
