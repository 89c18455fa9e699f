pub mod buffer;
pub mod general;

#[cfg(test)]
mod buffer_tests {
    use crate::buffer::RingBuffer;

    #[test]
    fn test_ringbuffer_1() {
        let x: RingBuffer<i32> = RingBuffer::new(5);
        assert!(x.is_empty());
        assert!(x.last().is_none());
    }
    #[test]
    fn test_ringbuffer_2() {
        let mut x: RingBuffer<i32> = RingBuffer::new(5);
        assert!(x.push(3).is_none());
        assert!(x.push(4).is_none());
        assert_eq!(x.to_vec(), vec![3, 4]);
        assert_eq!(x.last(), Some(&4));
    }
    #[test]
    fn test_ringbuffer_3() {
        let mut x: RingBuffer<i32> = RingBuffer::new(5);
        x.push(3);
        x.push(4);
        x.push(2);
        x.push(1);
        x.push(5);
        assert_eq!(x.push(10), Some(3));
        assert_eq!(x.push(11), Some(4));
        assert_eq!(x.len(), 5);
        assert_eq!(x.capacity(), 5);
        assert_eq!(x.to_vec(), vec![2, 1, 5, 10, 11]);
        assert_eq!(x.iter().rev().copied().collect::<Vec<i32>>(), vec![11, 10, 5, 1, 2]);
    }
    #[test]
    fn test_ringbuffer_clear() {
        let mut x: RingBuffer<i32> = RingBuffer::new(2);
        x.push(1);
        x.push(2);
        x.push(3);
        x.clear();
        x.push(7);
        assert_eq!(x.to_vec(), vec![7]);
    }
    #[test]
    fn test_ringbuffer_zero_capacity() {
        let mut x: RingBuffer<i32> = RingBuffer::new(0);
        assert_eq!(x.push(1), Some(1));
        assert!(x.is_empty());
    }
}

#[cfg(test)]
mod general_tests {
    use crate::general::{argmax, argsort, lin_interp, SortOrder};
    use approx::assert_ulps_eq;

    #[test]
    fn test_argmax_1() {
        let x: Vec<i32> = vec![3, -1, 5, 8, -2];
        assert_eq!(argmax(&x), 3);
    }
    #[test]
    fn test_argmax_2() {
        let x: Vec<f64> = vec![3.0, -1.0, 8.0, 8.0, -2.0];
        assert_eq!(argmax(&x), 2);
    }

    #[test]
    fn test_argsort_1() {
        let x: Vec<i32> = vec![3, -1, 5, 8, -2];
        assert_eq!(argsort(&x, SortOrder::Ascending), vec![4, 1, 0, 2, 3]);
    }
    #[test]
    fn test_argsort_2() {
        let x: Vec<i32> = vec![3, -1, 5, 8, -2];
        assert_eq!(argsort(&x, SortOrder::Descending), vec![3, 2, 0, 1, 4]);
    }
    #[test]
    fn test_argsort_stable() {
        let x: Vec<f64> = vec![50.0, 100.0, 50.0, 100.0, 20.0];
        assert_eq!(argsort(&x, SortOrder::Descending), vec![1, 3, 0, 2, 4]);
        assert_eq!(argsort(&x, SortOrder::Ascending), vec![4, 0, 2, 1, 3]);
    }

    #[test]
    fn test_lin_interp_1() {
        let xp: Vec<f64> = vec![-5.0, 0.0, 5.0, 10.0];
        let fp: Vec<f64> = vec![1.0, 2.0, 1.0, 0.0];
        assert_ulps_eq!(lin_interp(-2.5, &xp, &fp), 1.5);
    }
    #[test]
    fn test_lin_interp_2() {
        let xp: Vec<f64> = vec![97.5, 101.5];
        let fp: Vec<f64> = vec![10.0, 11.0];
        assert_ulps_eq!(lin_interp(100.0, &xp, &fp), 10.625);
    }
    #[test]
    fn test_lin_interp_3() {
        let xp: Vec<f64> = vec![-5.0, 0.0, 5.0, 10.0];
        let fp: Vec<f64> = vec![-1.0, -2.0, -1.0, 0.0];
        assert_ulps_eq!(lin_interp(12.5, &xp, &fp), 0.0);
    }
}
