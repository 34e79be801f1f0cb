use frame_api::FrameContext;

#[derive(Clone)]
pub struct AppState {
    pub frame: FrameContext,
}
