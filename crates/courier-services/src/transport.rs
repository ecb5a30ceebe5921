//! Transport seam: the single write primitive the transfer queue needs.

/// A transport that accepts small, bounded writes addressed to a peer.
///
/// `write_fragment` is a non-blocking attempt. `true` means the bytes were
/// accepted for transmission now; `false` means "not now, try again later".
/// The queue never asks why a write was rejected.
pub trait FragmentTransport<P> {
    fn write_fragment(&mut self, fragment: &[u8], destination: &P) -> bool;
}

impl<P, T: FragmentTransport<P> + ?Sized> FragmentTransport<P> for Box<T> {
    fn write_fragment(&mut self, fragment: &[u8], destination: &P) -> bool {
        (**self).write_fragment(fragment, destination)
    }
}
