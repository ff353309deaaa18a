// SPDX-License-Identifier: CEPL-1.0
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=shaders");

    #[cfg(feature = "compile-shaders")]
    compile::shaders()?;

    Ok(())
}

#[cfg(feature = "compile-shaders")]
mod compile {
    use std::{env, error::Error, fs, path::PathBuf};

    // (source, kind) pairs; output is `<source>.spv`.
    const SHADERS: &[(&str, shaderc::ShaderKind)] = &[
        ("universal.vert", shaderc::ShaderKind::Vertex),
        ("universal.frag", shaderc::ShaderKind::Fragment),
    ];

    pub fn shaders() -> Result<(), Box<dyn Error>> {
        let src_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?).join("shaders");
        let out_dir = PathBuf::from(env::var("OUT_DIR")?).join("shaders");
        fs::create_dir_all(&out_dir)?;

        let compiler = shaderc::Compiler::new().expect("shaderc compiler");
        let mut opts = shaderc::CompileOptions::new().expect("shaderc compile options");
        opts.set_target_env(
            shaderc::TargetEnv::Vulkan,
            shaderc::EnvVersion::Vulkan1_3 as u32,
        );
        opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

        for &(file, kind) in SHADERS {
            let path = src_dir.join(file);
            println!("cargo:rerun-if-changed={}", path.display());

            let source = fs::read_to_string(&path)?;
            let spv = compiler.compile_into_spirv(&source, kind, file, "main", Some(&opts))?;
            fs::write(out_dir.join(format!("{file}.spv")), spv.as_binary_u8())?;
        }

        println!("cargo:rustc-env=ASHLANDS_SHADER_DIR={}", out_dir.display());
        Ok(())
    }
}
