use core::ops::Range;




/**
 * A 3D scalar array with a fixed-width ghost padding along the z-axis. The
 * memory layout is x-fastest: the linear offset of (i, j, k) is `i + pitch *
 * (j + ny * k)`. The row pitch may exceed the logical row width `nx` for
 * alignment experiments; the padding lanes never participate in interior or
 * boundary arithmetic and are stripped whenever a slab leaves the array.
 */
pub struct Field3 {
    nx: usize,
    ny: usize,
    nz: usize,
    pitch: usize,
    data: Vec<f64>,
}




// ============================================================================
impl Field3 {


    /**
     * Allocate a zero field with a tight pitch.
     */
    pub fn zeros(nx: usize, ny: usize, nz: usize) -> Self {
        Self::with_pitch(nx, ny, nz, nx)
    }


    /**
     * Allocate a zero field with an explicit row pitch (`pitch >= nx`).
     */
    pub fn with_pitch(nx: usize, ny: usize, nz: usize, pitch: usize) -> Self {
        assert!(pitch >= nx, "row pitch may not be smaller than the row width");
        Self {
            nx,
            ny,
            nz,
            pitch,
            data: vec![0.0; pitch * ny * nz],
        }
    }


    /**
     * Build a field by evaluating a function of the (i, j, k) index. Pitch
     * lanes are left at zero.
     */
    pub fn from_function<F>(nx: usize, ny: usize, nz: usize, f: F) -> Self
    where
        F: Fn(usize, usize, usize) -> f64,
    {
        let mut field = Self::zeros(nx, ny, nz);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let n = field.offset(i, j, k);
                    field.data[n] = f(i, j, k);
                }
            }
        }
        field
    }


    /**
     * Adopt a tightly packed buffer of `nx * ny * nz` values.
     */
    pub fn from_data(nx: usize, ny: usize, nz: usize, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), nx * ny * nz);
        Self {
            nx,
            ny,
            nz,
            pitch: nx,
            data,
        }
    }


    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn nz(&self) -> usize {
        self.nz
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }


    /**
     * Linear offset of a logical index.
     */
    pub fn offset(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.pitch * (j + self.ny * k)
    }


    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data[self.offset(i, j, k)]
    }


    pub fn set(&mut self, i: usize, j: usize, k: usize, value: f64) {
        let n = self.offset(i, j, k);
        self.data[n] = value;
    }


    pub fn data(&self) -> &[f64] {
        &self.data
    }


    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }


    /**
     * Set every element, pitch lanes included.
     */
    pub fn fill(&mut self, value: f64) {
        for x in &mut self.data {
            *x = value;
        }
    }


    /**
     * Copy the contents of a same-shaped field into this one.
     */
    pub fn assign(&mut self, other: &Self) {
        assert_eq!(self.data.len(), other.data.len());
        self.data.copy_from_slice(&other.data);
    }


    /**
     * Copy a k-range out into a tightly packed buffer (pitch stripped),
     * preserving (i, j, k) ordering.
     */
    pub fn extract_k(&self, range: Range<usize>) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.nx * self.ny * range.len());
        for k in range {
            for j in 0..self.ny {
                let n = self.offset(0, j, k);
                out.extend_from_slice(&self.data[n..n + self.nx]);
            }
        }
        out
    }


    /**
     * The inverse of `extract_k`: deposit a tightly packed buffer into the
     * given k-range.
     */
    pub fn fill_k(&mut self, range: Range<usize>, buffer: &[f64]) {
        assert_eq!(buffer.len(), self.nx * self.ny * range.len());
        let mut rows = buffer.chunks_exact(self.nx);
        for k in range {
            for j in 0..self.ny {
                let n = self.offset(0, j, k);
                self.data[n..n + self.nx].copy_from_slice(rows.next().unwrap());
            }
        }
    }


    /**
     * Split the array into disjoint mutable slabs at the given
     * non-decreasing k cut points. The returned slabs cover the full
     * extent: cut points `[a, b]` produce slabs over `0..a`, `a..b`, and
     * `b..nz` (a repeated cut yields an empty slab). This is the only way
     * concurrent writers obtain access to the array, so non-overlap holds
     * by construction.
     */
    pub fn split_k_mut(&mut self, cuts: &[usize]) -> Vec<SlabMut> {
        let plane = self.pitch * self.ny;
        let (nx, ny, pitch) = (self.nx, self.ny, self.pitch);
        let mut slabs = Vec::with_capacity(cuts.len() + 1);
        let mut rest = &mut self.data[..];
        let mut k0 = 0;

        for &cut in cuts {
            assert!(cut >= k0, "cut points must be non-decreasing");
            assert!(cut <= self.nz);
            let (head, tail) = core::mem::take(&mut rest).split_at_mut((cut - k0) * plane);
            slabs.push(SlabMut {
                data: head,
                k: k0..cut,
                nx,
                ny,
                pitch,
            });
            rest = tail;
            k0 = cut;
        }
        slabs.push(SlabMut {
            data: rest,
            k: k0..self.nz,
            nx,
            ny,
            pitch,
        });
        slabs
    }
}




/**
 * A mutable view of a contiguous k-range of a `Field3`. Indexing uses the
 * parent array's global k coordinate. Each concurrent work item owns exactly
 * one of these, which is what makes lock-free writes to the shared rate
 * field sound.
 */
pub struct SlabMut<'a> {
    data: &'a mut [f64],
    k: Range<usize>,
    nx: usize,
    ny: usize,
    pitch: usize,
}




// ============================================================================
impl<'a> SlabMut<'a> {


    pub fn k_range(&self) -> Range<usize> {
        self.k.clone()
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.k.is_empty()
    }


    /**
     * Linear offset of a logical index; `k` is the parent array's
     * coordinate and must lie inside this slab's range.
     */
    pub fn offset(&self, i: usize, j: usize, k: usize) -> usize {
        debug_assert!(self.k.contains(&k));
        i + self.pitch * (j + self.ny * (k - self.k.start))
    }


    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data[self.offset(i, j, k)]
    }


    pub fn add(&mut self, i: usize, j: usize, k: usize, value: f64) {
        let n = self.offset(i, j, k);
        self.data[n] += value;
    }


    /**
     * One logical row (pitch stripped).
     */
    pub fn row(&self, j: usize, k: usize) -> &[f64] {
        let n = self.offset(0, j, k);
        &self.data[n..n + self.nx]
    }


    pub fn row_mut(&mut self, j: usize, k: usize) -> &mut [f64] {
        let n = self.offset(0, j, k);
        &mut self.data[n..n + self.nx]
    }


    /**
     * Chop this slab into consecutive pieces of at most `thickness` layers,
     * preserving the disjointness guarantee.
     */
    pub fn split_thickness(self, thickness: usize) -> Vec<SlabMut<'a>> {
        assert!(thickness > 0);
        let plane = self.pitch * self.ny;
        let (nx, ny, pitch) = (self.nx, self.ny, self.pitch);
        let mut pieces = Vec::new();
        let mut rest = self.data;
        let mut k0 = self.k.start;

        while k0 < self.k.end {
            let nk = thickness.min(self.k.end - k0);
            let (head, tail) = core::mem::take(&mut rest).split_at_mut(nk * plane);
            pieces.push(SlabMut {
                data: head,
                k: k0..k0 + nk,
                nx,
                ny,
                pitch,
            });
            rest = tail;
            k0 += nk;
        }
        pieces
    }
}
