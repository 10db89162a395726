use celerity_core::ModuleDescriptor;
use celerity_core_macros::module;

#[module]
fn widgets_module() -> ModuleDescriptor {
    ModuleDescriptor::new("widgets")
}

fn main() {}
