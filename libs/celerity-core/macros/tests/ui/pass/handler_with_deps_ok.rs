use celerity_core::contracts::Value;
use celerity_core::{HandlerContext, HttpException, InjectionToken};
use celerity_core_macros::handler;

struct WidgetRepo;

#[handler(id = "widgets.create", verb = "Post", path = "/widgets")]
async fn create_widget(_ctx: HandlerContext, _repo: &WidgetRepo) -> Result<Value, HttpException> {
    Ok(Value::String("created".to_string()))
}

fn main() {
    let _descriptor = create_widget_descriptor().inject(InjectionToken::of::<WidgetRepo>());
}
