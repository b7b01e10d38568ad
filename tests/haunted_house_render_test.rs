#[cfg(feature = "integration-tests")]
mod common;

#[test]
#[cfg(feature = "integration-tests")]
fn should_draw_the_house_in_front_of_the_sky() {
    use common::test_utils::run_inspected;
    use haunted_house::{config::SceneConfig, flow::ImageTestResult, resources::Assets, scene};

    // no textures here, every material falls back to neutral maps
    let constructor = scene::constructor(SceneConfig::default(), Assets::new("tests/no-assets"), Some(7));

    run_inspected(
        constructor,
        Box::new(|ctx, state, frame| {
            if state.frame() < 3 {
                return Ok(ImageTestResult::Waiting);
            }
            let (width, height) = (ctx.config.width, ctx.config.height);
            // the camera looks at the house, which hides the sky in the middle of the frame
            let centre = *frame.get_pixel(width / 2, height / 2);
            let corner = *frame.get_pixel(0, 0);
            assert_ne!(centre, corner, "the house is missing from the frame");
            assert!(frame.pixels().all(|p| p[3] == 255));
            Ok(ImageTestResult::Passed)
        }),
    );
}
