mod hit_resolution_test;
