use celerity_core::contracts::Value;
use celerity_core::provider::{ConstructFn, Instance};
use celerity_core::{HandlerContext, HttpException};
use celerity_core_macros::{controller, injectable};
use std::sync::Arc;

#[injectable]
#[derive(Default)]
struct Widgets;

#[controller(prefix = "/widgets")]
impl Widgets {
    #[get("/{id}")]
    #[public]
    async fn get_one(&self, _ctx: HandlerContext) -> Result<Value, HttpException> {
        Ok(Value::String("ok".to_string()))
    }
}

fn construct() -> ConstructFn {
    Arc::new(|_deps| Box::pin(async { Ok(Arc::new(Widgets) as Instance) }))
}

fn main() {
    let _descriptor = Widgets::celerity_descriptor(vec![], true, construct());
}
