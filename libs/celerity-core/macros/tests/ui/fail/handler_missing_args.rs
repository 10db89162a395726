use celerity_core::contracts::Value;
use celerity_core::{HandlerContext, HttpException};
use celerity_core_macros::handler;

#[handler(id = "ping")]
async fn ping(_ctx: HandlerContext) -> Result<Value, HttpException> {
    Ok(Value::String("pong".to_string()))
}

fn main() {}
