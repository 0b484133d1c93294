use crate::dom::Page;
use crate::error::Result;

/// Source of browser sessions.
///
/// Implemented outside the engine: the engine only asks for a fresh
/// connection and the page it should drive.
pub trait SessionProvider {
    /// Keeps the underlying connection alive for as long as it is held
    type Handle;
    type Page: Page;

    fn connect(&self) -> Result<Self::Handle>;

    fn active_page(&self, handle: &Self::Handle) -> Result<Self::Page>;
}

/// A live connection and the page the engine drives through it.
///
/// Owned by exactly one run and replaced wholesale on reconnect.
pub struct Session<H, P> {
    pub handle: H,
    pub page: P,
}

impl<H, P: Page> Session<H, P> {
    pub fn new(handle: H, page: P) -> Self {
        Self { handle, page }
    }

    /// Connect through `provider` and pick its active page
    pub fn open<S>(provider: &S) -> Result<Self>
    where
        S: SessionProvider<Handle = H, Page = P>,
    {
        let handle = provider.connect()?;
        let page = provider.active_page(&handle)?;
        Ok(Self { handle, page })
    }
}
