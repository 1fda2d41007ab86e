//! Dear ImGui overlay backends: a Win32 platform layer fed from forwarded
//! window messages and a Direct3D 11 renderer for its draw data.

#[cfg(windows)]
mod platform;
#[cfg(windows)]
mod renderer;

#[cfg(windows)]
pub use platform::Win32Platform;
#[cfg(windows)]
pub use renderer::Dx11Renderer;

/// Creates an ImGui context with the dark style and no `.ini` persistence.
pub fn create_context() -> imgui::Context {
    let mut ctx = imgui::Context::create();
    ctx.set_ini_filename(None);
    ctx.style_mut().use_dark_colors();
    ctx
}
