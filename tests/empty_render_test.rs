#[cfg(feature = "integration-tests")]
mod common;

#[test]
#[cfg(feature = "integration-tests")]
fn should_render_an_opaque_backdrop_without_geometry() {
    use common::test_utils::{FrameCounter, Nothing, run_inspected};
    use haunted_house::flow::{FlowConstructor, GraphicsFlow, ImageTestResult};

    let constructor: FlowConstructor<FrameCounter, ()> = Box::new(|_| {
        Box::pin(async move {
            let flow: Box<dyn GraphicsFlow<FrameCounter, ()>> = Box::new(Nothing);
            anyhow::Ok(flow)
        })
    });

    run_inspected(
        constructor,
        Box::new(|ctx, state, frame| {
            if state.frame() < 2 {
                return Ok(ImageTestResult::Waiting);
            }
            assert_eq!(frame.dimensions(), (ctx.config.width, ctx.config.height));
            // sky and clear colour cover every pixel
            assert!(frame.pixels().all(|p| p[3] == 255));
            Ok(ImageTestResult::Passed)
        }),
    );
}
